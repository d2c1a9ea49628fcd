use std::time::Duration;

use agentpay_core::config::WalletConfig;
use agentpay_core::{
    ApplicationError, Collaborator, TokenBalance, TransferReceipt, TransferRequest,
    TransportError, WalletProvider,
};
use async_trait::async_trait;
use reqwest::{Method, Url};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ciphertext::encrypt_entity_secret;

const ACCOUNT_TYPE: &str = "SCA";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatedWallet {
    pub id: String,
    pub address: Option<String>,
    pub blockchain: Option<String>,
}

/// REST client for Circle's developer-controlled wallets.
///
/// The entity public key is fetched at most once per client. Every mutating
/// call carries a freshly encrypted entity secret.
pub struct CircleClient {
    config: WalletConfig,
    client: reqwest::Client,
    entity_public_key: OnceCell<String>,
}

impl CircleClient {
    pub fn from_config(config: &WalletConfig) -> Result<Self, ApplicationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                ApplicationError::Configuration(format!(
                    "failed to build wallet http client: {error}"
                ))
            })?;
        Ok(Self { config: config.clone(), client, entity_public_key: OnceCell::new() })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApplicationError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|error| {
            ApplicationError::Configuration(format!("wallet.base_url is not a valid url: {error}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ApplicationError::Configuration(
                    "wallet.base_url cannot carry a path".to_string(),
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, ApplicationError> {
        let api_key = self.config.require_api_key()?;
        let url = self.endpoint(segments)?;
        debug!(event_name = "wallet.http.request", method = %method, path = url.path());

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(api_key.expose_secret())
            .header("accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| {
            let message = error.to_string();
            TransportError::network(Collaborator::Wallet, message.clone())
                .with_details(json!({ "message": message }))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|error| {
            TransportError::status(
                Collaborator::Wallet,
                status.as_u16(),
                format!("failed to read Circle response: {error}"),
            )
        })?;
        let payload = serde_json::from_str::<Value>(&text).ok();

        if !status.is_success() {
            let message = payload
                .as_ref()
                .and_then(|value| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Circle API error: {}", status.as_u16()));
            warn!(
                event_name = "wallet.http.error",
                status = status.as_u16(),
                message = %message,
                "circle api returned an error status"
            );
            return Err(TransportError::status(Collaborator::Wallet, status.as_u16(), message)
                .with_details(payload.unwrap_or_else(|| json!({ "body": text })))
                .into());
        }

        payload.ok_or_else(|| {
            TransportError::status(
                Collaborator::Wallet,
                status.as_u16(),
                "Circle response was not valid JSON",
            )
            .into()
        })
    }

    /// PEM public key used to encrypt the entity secret.
    pub async fn entity_public_key(&self) -> Result<String, ApplicationError> {
        self.entity_public_key
            .get_or_try_init(|| async {
                let payload =
                    self.call(Method::GET, &["v1", "w3s", "config", "entity", "publicKey"], None)
                        .await?;
                payload
                    .pointer("/data/publicKey")
                    .or_else(|| payload.get("publicKey"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ApplicationError::Integration(
                            "could not find publicKey in entity config response".to_string(),
                        )
                    })
            })
            .await
            .cloned()
    }

    pub async fn entity_secret_ciphertext(&self) -> Result<String, ApplicationError> {
        let (_, entity_secret) = self.config.require_credentials()?;
        let public_key = self.entity_public_key().await?;
        encrypt_entity_secret(entity_secret.expose_secret(), &public_key)
            .map_err(|error| ApplicationError::Configuration(error.to_string()))
    }

    pub async fn create_wallet_set(&self, name: &str) -> Result<String, ApplicationError> {
        let body = json!({
            "idempotencyKey": Uuid::new_v4().to_string(),
            "entitySecretCiphertext": self.entity_secret_ciphertext().await?,
            "name": name,
        });
        let payload =
            self.call(Method::POST, &["v1", "w3s", "developer", "walletSets"], Some(&body)).await?;

        payload
            .pointer("/data/walletSet/id")
            .or_else(|| payload.pointer("/data/id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApplicationError::Integration(
                    "could not read walletSetId from response".to_string(),
                )
            })
    }

    pub async fn create_wallets(
        &self,
        wallet_set_id: &str,
        blockchain: &str,
        count: u32,
    ) -> Result<Vec<CreatedWallet>, ApplicationError> {
        let body = json!({
            "idempotencyKey": Uuid::new_v4().to_string(),
            "entitySecretCiphertext": self.entity_secret_ciphertext().await?,
            "walletSetId": wallet_set_id,
            "blockchains": [blockchain],
            "count": count,
            "accountType": ACCOUNT_TYPE,
        });
        let payload =
            self.call(Method::POST, &["v1", "w3s", "developer", "wallets"], Some(&body)).await?;

        let wallets = payload
            .pointer("/data/wallets")
            .and_then(Value::as_array)
            .map(|wallets| {
                wallets
                    .iter()
                    .filter_map(|wallet| {
                        Some(CreatedWallet {
                            id: wallet.get("id")?.as_str()?.to_string(),
                            address: string_field(wallet, "address"),
                            blockchain: string_field(wallet, "blockchain"),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if wallets.len() < count as usize {
            return Err(ApplicationError::Integration(format!(
                "expected {count} wallets in response but got {}",
                wallets.len()
            )));
        }
        Ok(wallets)
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// `data.<key>` when present, else `data`, else the payload itself.
fn data_member(payload: Value, key: &str) -> Value {
    match payload {
        Value::Object(mut root) => match root.remove("data") {
            Some(Value::Object(mut data)) => data.remove(key).unwrap_or(Value::Object(data)),
            Some(other) => other,
            None => Value::Object(root),
        },
        other => other,
    }
}

#[async_trait]
impl WalletProvider for CircleClient {
    async fn list_balances(&self, wallet_id: &str) -> Result<Vec<TokenBalance>, ApplicationError> {
        let payload = self.balances_payload(wallet_id).await?;
        match payload.pointer("/data/tokenBalances") {
            Some(balances) => serde_json::from_value(balances.clone()).map_err(|error| {
                ApplicationError::Integration(format!("unexpected tokenBalances shape: {error}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn balances_payload(&self, wallet_id: &str) -> Result<Value, ApplicationError> {
        self.call(Method::GET, &["v1", "w3s", "wallets", wallet_id, "balances"], None).await
    }

    async fn transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferReceipt, ApplicationError> {
        let body = json!({
            "idempotencyKey": request.idempotency_key,
            "entitySecretCiphertext": self.entity_secret_ciphertext().await?,
            "walletId": request.wallet_id,
            "destinationAddress": request.destination_address,
            "tokenId": request.token_id,
            "amounts": [request.amount.normalize().to_string()],
            "feeLevel": request.fee_level,
        });
        let payload = self
            .call(Method::POST, &["v1", "w3s", "developer", "transactions", "transfer"], Some(&body))
            .await?;

        let data = data_member(payload, "transaction");
        let id = string_field(&data, "id").ok_or_else(|| {
            ApplicationError::Integration("transfer response carried no transaction id".to_string())
        })?;
        Ok(TransferReceipt {
            id,
            state: string_field(&data, "state"),
            tx_hash: string_field(&data, "txHash"),
        })
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Value, ApplicationError> {
        let payload =
            self.call(Method::GET, &["v1", "w3s", "transactions", transaction_id], None).await?;
        Ok(data_member(payload, "transaction"))
    }

    async fn get_wallet(&self, wallet_id: &str) -> Result<Value, ApplicationError> {
        let payload = self.call(Method::GET, &["v1", "w3s", "wallets", wallet_id], None).await?;
        Ok(data_member(payload, "wallet"))
    }
}
