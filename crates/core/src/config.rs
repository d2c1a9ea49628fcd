use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub wallet: WalletConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct WalletConfig {
    pub api_key: Option<SecretString>,
    pub entity_secret: Option<SecretString>,
    pub base_url: String,
    pub blockchain: Option<String>,
    pub agent_wallet_id: Option<String>,
    pub merchant_wallet_id: Option<String>,
    pub merchant_address: Option<String>,
    pub wallet_set_id: Option<String>,
    pub explorer_tx_base: Option<String>,
    pub timeout_secs: u64,
    pub fee_level: FeeLevel,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub cors_origin: String,
    pub body_limit_bytes: usize,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeLevel {
    Low,
    Medium,
    High,
}

impl FeeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Everything a transfer from the agent wallet to the merchant needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferSettings {
    pub source_wallet_id: String,
    pub destination_address: String,
    pub blockchain: String,
    pub fee_level: FeeLevel,
    pub explorer_tx_base: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub wallet_api_key: Option<String>,
    pub wallet_entity_secret: Option<String>,
    pub wallet_base_url: Option<String>,
    pub wallet_blockchain: Option<String>,
    pub agent_wallet_id: Option<String>,
    pub merchant_wallet_id: Option<String>,
    pub merchant_address: Option<String>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
}

/// A setting that is optional at load time but required by some operation.
struct RequiredKey {
    path: &'static str,
    env: &'static str,
    alias: &'static str,
}

impl RequiredKey {
    fn describe(&self) -> String {
        format!("{} (set {} or {})", self.path, self.env, self.alias)
    }
}

const LLM_API_KEY: RequiredKey =
    RequiredKey { path: "llm.api_key", env: "AGENTPAY_LLM_API_KEY", alias: "GEMINI_API_KEY" };
const WALLET_API_KEY: RequiredKey =
    RequiredKey { path: "wallet.api_key", env: "AGENTPAY_WALLET_API_KEY", alias: "CIRCLE_API_KEY" };
const WALLET_ENTITY_SECRET: RequiredKey = RequiredKey {
    path: "wallet.entity_secret",
    env: "AGENTPAY_WALLET_ENTITY_SECRET",
    alias: "CIRCLE_ENTITY_SECRET",
};
const WALLET_BLOCKCHAIN: RequiredKey = RequiredKey {
    path: "wallet.blockchain",
    env: "AGENTPAY_WALLET_BLOCKCHAIN",
    alias: "CIRCLE_BLOCKCHAIN",
};
const AGENT_WALLET_ID: RequiredKey = RequiredKey {
    path: "wallet.agent_wallet_id",
    env: "AGENTPAY_WALLET_AGENT_WALLET_ID",
    alias: "CIRCLE_AGENT_WALLET_ID",
};
const MERCHANT_WALLET_ID: RequiredKey = RequiredKey {
    path: "wallet.merchant_wallet_id",
    env: "AGENTPAY_WALLET_MERCHANT_WALLET_ID",
    alias: "CIRCLE_MERCHANT_WALLET_ID",
};
const MERCHANT_ADDRESS: RequiredKey = RequiredKey {
    path: "wallet.merchant_address",
    env: "AGENTPAY_WALLET_MERCHANT_ADDRESS",
    alias: "MERCHANT_WALLET_ADDRESS",
};

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.5-flash".to_string(),
                timeout_secs: 60,
                max_output_tokens: 1024,
            },
            wallet: WalletConfig {
                api_key: None,
                entity_secret: None,
                base_url: "https://api.circle.com".to_string(),
                blockchain: None,
                agent_wallet_id: None,
                merchant_wallet_id: None,
                merchant_address: None,
                wallet_set_id: None,
                explorer_tx_base: None,
                timeout_secs: 15,
                fee_level: FeeLevel::Medium,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3001,
                cors_origin: "*".to_string(),
                body_limit_bytes: 1024 * 1024,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for FeeLevel {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            other => Err(ConfigError::Validation(format!(
                "unsupported fee level `{other}` (expected LOW|MEDIUM|HIGH)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("agentpay.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
        }

        if let Some(wallet) = patch.wallet {
            if let Some(wallet_api_key_value) = wallet.api_key {
                self.wallet.api_key = Some(secret_value(wallet_api_key_value));
            }
            if let Some(entity_secret_value) = wallet.entity_secret {
                self.wallet.entity_secret = Some(secret_value(entity_secret_value));
            }
            if let Some(base_url) = wallet.base_url {
                self.wallet.base_url = base_url;
            }
            if let Some(blockchain) = wallet.blockchain {
                self.wallet.blockchain = Some(blockchain);
            }
            if let Some(agent_wallet_id) = wallet.agent_wallet_id {
                self.wallet.agent_wallet_id = Some(agent_wallet_id);
            }
            if let Some(merchant_wallet_id) = wallet.merchant_wallet_id {
                self.wallet.merchant_wallet_id = Some(merchant_wallet_id);
            }
            if let Some(merchant_address) = wallet.merchant_address {
                self.wallet.merchant_address = Some(merchant_address);
            }
            if let Some(wallet_set_id) = wallet.wallet_set_id {
                self.wallet.wallet_set_id = Some(wallet_set_id);
            }
            if let Some(explorer_tx_base) = wallet.explorer_tx_base {
                self.wallet.explorer_tx_base = Some(explorer_tx_base);
            }
            if let Some(timeout_secs) = wallet.timeout_secs {
                self.wallet.timeout_secs = timeout_secs;
            }
            if let Some(fee_level) = wallet.fee_level {
                self.wallet.fee_level = fee_level;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(cors_origin) = server.cors_origin {
                self.server.cors_origin = cors_origin;
            }
            if let Some(body_limit_bytes) = server.body_limit_bytes {
                self.server.body_limit_bytes = body_limit_bytes;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_alias(LLM_API_KEY.env, LLM_API_KEY.alias) {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AGENTPAY_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env_alias("AGENTPAY_LLM_MODEL", "GEMINI_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AGENTPAY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AGENTPAY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AGENTPAY_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("AGENTPAY_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }

        if let Some(value) = read_env_alias(WALLET_API_KEY.env, WALLET_API_KEY.alias) {
            self.wallet.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_alias(WALLET_ENTITY_SECRET.env, WALLET_ENTITY_SECRET.alias) {
            self.wallet.entity_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("AGENTPAY_WALLET_BASE_URL") {
            self.wallet.base_url = value;
        }
        if let Some(value) = read_env_alias(WALLET_BLOCKCHAIN.env, WALLET_BLOCKCHAIN.alias) {
            self.wallet.blockchain = Some(value);
        }
        if let Some(value) = read_env_alias(AGENT_WALLET_ID.env, AGENT_WALLET_ID.alias) {
            self.wallet.agent_wallet_id = Some(value);
        }
        if let Some(value) = read_env_alias(MERCHANT_WALLET_ID.env, MERCHANT_WALLET_ID.alias) {
            self.wallet.merchant_wallet_id = Some(value);
        }
        if let Some(value) = read_env_alias(MERCHANT_ADDRESS.env, MERCHANT_ADDRESS.alias) {
            self.wallet.merchant_address = Some(value);
        }
        if let Some(value) = read_env_alias("AGENTPAY_WALLET_WALLET_SET_ID", "CIRCLE_WALLET_SET_ID")
        {
            self.wallet.wallet_set_id = Some(value);
        }
        if let Some(value) = read_env_alias("AGENTPAY_WALLET_EXPLORER_TX_BASE", "EXPLORER_TX_BASE")
        {
            self.wallet.explorer_tx_base = Some(value);
        }
        if let Some(value) = read_env("AGENTPAY_WALLET_TIMEOUT_SECS") {
            self.wallet.timeout_secs = parse_u64("AGENTPAY_WALLET_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AGENTPAY_WALLET_FEE_LEVEL") {
            self.wallet.fee_level = value.parse()?;
        }

        if let Some(value) = read_env("AGENTPAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env_alias("AGENTPAY_SERVER_PORT", "PORT") {
            self.server.port = parse_u16("AGENTPAY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env_alias("AGENTPAY_SERVER_CORS_ORIGIN", "CORS_ORIGIN") {
            self.server.cors_origin = value;
        }
        if let Some(value) = read_env("AGENTPAY_SERVER_BODY_LIMIT_BYTES") {
            self.server.body_limit_bytes = parse_usize("AGENTPAY_SERVER_BODY_LIMIT_BYTES", &value)?;
        }
        if let Some(value) = read_env("AGENTPAY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AGENTPAY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env_alias("AGENTPAY_LOGGING_LEVEL", "AGENTPAY_LOG_LEVEL");
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env_alias("AGENTPAY_LOGGING_FORMAT", "AGENTPAY_LOG_FORMAT");
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(wallet_api_key) = overrides.wallet_api_key {
            self.wallet.api_key = Some(secret_value(wallet_api_key));
        }
        if let Some(entity_secret) = overrides.wallet_entity_secret {
            self.wallet.entity_secret = Some(secret_value(entity_secret));
        }
        if let Some(wallet_base_url) = overrides.wallet_base_url {
            self.wallet.base_url = wallet_base_url;
        }
        if let Some(blockchain) = overrides.wallet_blockchain {
            self.wallet.blockchain = Some(blockchain);
        }
        if let Some(agent_wallet_id) = overrides.agent_wallet_id {
            self.wallet.agent_wallet_id = Some(agent_wallet_id);
        }
        if let Some(merchant_wallet_id) = overrides.merchant_wallet_id {
            self.wallet.merchant_wallet_id = Some(merchant_wallet_id);
        }
        if let Some(merchant_address) = overrides.merchant_address {
            self.wallet.merchant_address = Some(merchant_address);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_wallet(&self.wallet)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl LlmConfig {
    pub fn require_api_key(&self) -> Result<&SecretString, ConfigError> {
        present_secret(self.api_key.as_ref())
            .ok_or_else(|| ConfigError::MissingRequired(vec![LLM_API_KEY.describe()]))
    }
}

impl WalletConfig {
    pub fn require_api_key(&self) -> Result<&SecretString, ConfigError> {
        present_secret(self.api_key.as_ref())
            .ok_or_else(|| ConfigError::MissingRequired(vec![WALLET_API_KEY.describe()]))
    }

    pub fn require_entity_secret(&self) -> Result<&SecretString, ConfigError> {
        present_secret(self.entity_secret.as_ref())
            .ok_or_else(|| ConfigError::MissingRequired(vec![WALLET_ENTITY_SECRET.describe()]))
    }

    /// API key and entity secret, needed together by any mutating wallet call.
    pub fn require_credentials(&self) -> Result<(&SecretString, &SecretString), ConfigError> {
        let api_key = present_secret(self.api_key.as_ref());
        let entity_secret = present_secret(self.entity_secret.as_ref());
        match (api_key, entity_secret) {
            (Some(api_key), Some(entity_secret)) => Ok((api_key, entity_secret)),
            _ => {
                let mut missing = Vec::new();
                if api_key.is_none() {
                    missing.push(WALLET_API_KEY.describe());
                }
                if entity_secret.is_none() {
                    missing.push(WALLET_ENTITY_SECRET.describe());
                }
                Err(ConfigError::MissingRequired(missing))
            }
        }
    }

    pub fn require_blockchain(&self) -> Result<&str, ConfigError> {
        present(self.blockchain.as_deref())
            .ok_or_else(|| ConfigError::MissingRequired(vec![WALLET_BLOCKCHAIN.describe()]))
    }

    pub fn require_agent_wallet_id(&self) -> Result<&str, ConfigError> {
        present(self.agent_wallet_id.as_deref())
            .ok_or_else(|| ConfigError::MissingRequired(vec![AGENT_WALLET_ID.describe()]))
    }

    /// Agent and merchant wallet ids, reporting every missing one at once.
    pub fn require_wallet_pair(&self) -> Result<(&str, &str), ConfigError> {
        let agent = present(self.agent_wallet_id.as_deref());
        let merchant = present(self.merchant_wallet_id.as_deref());
        match (agent, merchant) {
            (Some(agent), Some(merchant)) => Ok((agent, merchant)),
            _ => {
                let mut missing = Vec::new();
                if agent.is_none() {
                    missing.push(AGENT_WALLET_ID.describe());
                }
                if merchant.is_none() {
                    missing.push(MERCHANT_WALLET_ID.describe());
                }
                Err(ConfigError::MissingRequired(missing))
            }
        }
    }

    pub fn transfer_settings(&self) -> Result<TransferSettings, ConfigError> {
        let source = present(self.agent_wallet_id.as_deref());
        let destination = present(self.merchant_address.as_deref());
        let blockchain = present(self.blockchain.as_deref());

        let mut missing = Vec::new();
        if source.is_none() {
            missing.push(AGENT_WALLET_ID.describe());
        }
        if destination.is_none() {
            missing.push(MERCHANT_ADDRESS.describe());
        }
        if blockchain.is_none() {
            missing.push(WALLET_BLOCKCHAIN.describe());
        }

        match (source, destination, blockchain) {
            (Some(source), Some(destination), Some(blockchain)) => Ok(TransferSettings {
                source_wallet_id: source.to_string(),
                destination_address: destination.to_string(),
                blockchain: blockchain.to_string(),
                fee_level: self.fee_level,
                explorer_tx_base: present(self.explorer_tx_base.as_deref()).map(str::to_string),
            }),
            _ => Err(ConfigError::MissingRequired(missing)),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn present_secret(value: Option<&SecretString>) -> Option<&SecretString> {
    value.filter(|secret| !secret.expose_secret().trim().is_empty())
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("agentpay.toml"), PathBuf::from("config/agentpay.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    validate_http_url("llm.base_url", &llm.base_url)?;

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_wallet(wallet: &WalletConfig) -> Result<(), ConfigError> {
    validate_http_url("wallet.base_url", &wallet.base_url)?;

    if wallet.timeout_secs == 0 || wallet.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "wallet.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(entity_secret) = present_secret(wallet.entity_secret.as_ref()) {
        let secret = entity_secret.expose_secret().trim();
        let is_hex_32_bytes =
            secret.len() == 64 && secret.chars().all(|ch| ch.is_ascii_hexdigit());
        if !is_hex_32_bytes {
            return Err(ConfigError::Validation(
                "wallet.entity_secret must be 64 hex characters (32 bytes)".to_string(),
            ));
        }
    }

    if let Some(explorer_tx_base) = present(wallet.explorer_tx_base.as_deref()) {
        validate_http_url("wallet.explorer_tx_base", explorer_tx_base)?;
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.cors_origin.trim().is_empty() {
        return Err(ConfigError::Validation(
            "server.cors_origin must be `*` or an origin URL".to_string(),
        ));
    }

    if server.body_limit_bytes == 0 {
        return Err(ConfigError::Validation(
            "server.body_limit_bytes must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn read_env_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    wallet: Option<WalletPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct WalletPatch {
    api_key: Option<String>,
    entity_secret: Option<String>,
    base_url: Option<String>,
    blockchain: Option<String>,
    agent_wallet_id: Option<String>,
    merchant_wallet_id: Option<String>,
    merchant_address: Option<String>,
    wallet_set_id: Option<String>,
    explorer_tx_base: Option<String>,
    timeout_secs: Option<u64>,
    fee_level: Option<FeeLevel>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    cors_origin: Option<String>,
    body_limit_bytes: Option<usize>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

/// Every variable `AppConfig::load` reads, for tests that need a clean slate.
pub const CONFIG_ENV_VARS: &[&str] = &[
    "AGENTPAY_LLM_API_KEY",
    "GEMINI_API_KEY",
    "AGENTPAY_LLM_BASE_URL",
    "AGENTPAY_LLM_MODEL",
    "GEMINI_MODEL",
    "AGENTPAY_LLM_TIMEOUT_SECS",
    "AGENTPAY_LLM_MAX_OUTPUT_TOKENS",
    "AGENTPAY_WALLET_API_KEY",
    "CIRCLE_API_KEY",
    "AGENTPAY_WALLET_ENTITY_SECRET",
    "CIRCLE_ENTITY_SECRET",
    "AGENTPAY_WALLET_BASE_URL",
    "AGENTPAY_WALLET_BLOCKCHAIN",
    "CIRCLE_BLOCKCHAIN",
    "AGENTPAY_WALLET_AGENT_WALLET_ID",
    "CIRCLE_AGENT_WALLET_ID",
    "AGENTPAY_WALLET_MERCHANT_WALLET_ID",
    "CIRCLE_MERCHANT_WALLET_ID",
    "AGENTPAY_WALLET_MERCHANT_ADDRESS",
    "MERCHANT_WALLET_ADDRESS",
    "AGENTPAY_WALLET_WALLET_SET_ID",
    "CIRCLE_WALLET_SET_ID",
    "AGENTPAY_WALLET_EXPLORER_TX_BASE",
    "EXPLORER_TX_BASE",
    "AGENTPAY_WALLET_TIMEOUT_SECS",
    "AGENTPAY_WALLET_FEE_LEVEL",
    "AGENTPAY_SERVER_BIND_ADDRESS",
    "AGENTPAY_SERVER_PORT",
    "PORT",
    "AGENTPAY_SERVER_CORS_ORIGIN",
    "CORS_ORIGIN",
    "AGENTPAY_SERVER_BODY_LIMIT_BYTES",
    "AGENTPAY_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "AGENTPAY_LOGGING_LEVEL",
    "AGENTPAY_LOG_LEVEL",
    "AGENTPAY_LOGGING_FORMAT",
    "AGENTPAY_LOG_FORMAT",
];
