use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use agentpay_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key_path: &'static str,
    value: String,
    env_key: &'static str,
    alias: Option<&'static str>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec![
        "effective config (source precedence: override > env > file > default):".to_string(),
    ];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            &[Some(field.env_key), field.alias],
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let llm = &config.llm;
    let wallet = &config.wallet;
    let server = &config.server;

    vec![
        field(
            "llm.api_key",
            redact_secret(llm.api_key.as_ref()),
            "AGENTPAY_LLM_API_KEY",
            Some("GEMINI_API_KEY"),
        ),
        field("llm.base_url", llm.base_url.clone(), "AGENTPAY_LLM_BASE_URL", None),
        field("llm.model", llm.model.clone(), "AGENTPAY_LLM_MODEL", Some("GEMINI_MODEL")),
        field("llm.timeout_secs", llm.timeout_secs.to_string(), "AGENTPAY_LLM_TIMEOUT_SECS", None),
        field(
            "llm.max_output_tokens",
            llm.max_output_tokens.to_string(),
            "AGENTPAY_LLM_MAX_OUTPUT_TOKENS",
            None,
        ),
        field(
            "wallet.api_key",
            redact_secret(wallet.api_key.as_ref()),
            "AGENTPAY_WALLET_API_KEY",
            Some("CIRCLE_API_KEY"),
        ),
        field(
            "wallet.entity_secret",
            redact_secret(wallet.entity_secret.as_ref()),
            "AGENTPAY_WALLET_ENTITY_SECRET",
            Some("CIRCLE_ENTITY_SECRET"),
        ),
        field("wallet.base_url", wallet.base_url.clone(), "AGENTPAY_WALLET_BASE_URL", None),
        field(
            "wallet.blockchain",
            optional(wallet.blockchain.as_deref()),
            "AGENTPAY_WALLET_BLOCKCHAIN",
            Some("CIRCLE_BLOCKCHAIN"),
        ),
        field(
            "wallet.agent_wallet_id",
            optional(wallet.agent_wallet_id.as_deref()),
            "AGENTPAY_WALLET_AGENT_WALLET_ID",
            Some("CIRCLE_AGENT_WALLET_ID"),
        ),
        field(
            "wallet.merchant_wallet_id",
            optional(wallet.merchant_wallet_id.as_deref()),
            "AGENTPAY_WALLET_MERCHANT_WALLET_ID",
            Some("CIRCLE_MERCHANT_WALLET_ID"),
        ),
        field(
            "wallet.merchant_address",
            optional(wallet.merchant_address.as_deref()),
            "AGENTPAY_WALLET_MERCHANT_ADDRESS",
            Some("MERCHANT_WALLET_ADDRESS"),
        ),
        field(
            "wallet.wallet_set_id",
            optional(wallet.wallet_set_id.as_deref()),
            "AGENTPAY_WALLET_WALLET_SET_ID",
            Some("CIRCLE_WALLET_SET_ID"),
        ),
        field(
            "wallet.explorer_tx_base",
            optional(wallet.explorer_tx_base.as_deref()),
            "AGENTPAY_WALLET_EXPLORER_TX_BASE",
            Some("EXPLORER_TX_BASE"),
        ),
        field(
            "wallet.timeout_secs",
            wallet.timeout_secs.to_string(),
            "AGENTPAY_WALLET_TIMEOUT_SECS",
            None,
        ),
        field(
            "wallet.fee_level",
            wallet.fee_level.as_str().to_string(),
            "AGENTPAY_WALLET_FEE_LEVEL",
            None,
        ),
        field(
            "server.bind_address",
            server.bind_address.clone(),
            "AGENTPAY_SERVER_BIND_ADDRESS",
            None,
        ),
        field("server.port", server.port.to_string(), "AGENTPAY_SERVER_PORT", Some("PORT")),
        field(
            "server.cors_origin",
            server.cors_origin.clone(),
            "AGENTPAY_SERVER_CORS_ORIGIN",
            Some("CORS_ORIGIN"),
        ),
        field(
            "server.body_limit_bytes",
            server.body_limit_bytes.to_string(),
            "AGENTPAY_SERVER_BODY_LIMIT_BYTES",
            None,
        ),
        field(
            "server.graceful_shutdown_secs",
            server.graceful_shutdown_secs.to_string(),
            "AGENTPAY_SERVER_GRACEFUL_SHUTDOWN_SECS",
            None,
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            "AGENTPAY_LOGGING_LEVEL",
            Some("AGENTPAY_LOG_LEVEL"),
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            "AGENTPAY_LOGGING_FORMAT",
            Some("AGENTPAY_LOG_FORMAT"),
        ),
    ]
}

fn field(
    key_path: &'static str,
    value: String,
    env_key: &'static str,
    alias: Option<&'static str>,
) -> Field {
    Field { key_path, value, env_key, alias }
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("agentpay.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/agentpay.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[Option<&str>],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys.iter().flatten() {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) => redact_token(secret.expose_secret()),
        None => "<unset>".to_string(),
    }
}

/// Keeps the environment prefix of `ENV:id:secret` style keys.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once(':') {
        return format!("{prefix}:***");
    }

    "<redacted>".to_string()
}
