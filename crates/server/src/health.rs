use agentpay_core::config::AppConfig;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

/// Credential readiness captured at startup. Health never calls collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthState {
    inference: HealthCheck,
    wallet: HealthCheck,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: &'static str,
    pub service: &'static str,
    pub inference: HealthCheck,
    pub wallet: HealthCheck,
    pub checked_at: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        let inference = match config.llm.require_api_key() {
            Ok(_) => HealthCheck {
                status: "ready",
                detail: format!("model {} configured", config.llm.model),
            },
            Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
        };

        let transfers =
            config.wallet.require_credentials().and_then(|_| config.wallet.transfer_settings());
        let wallet = match transfers {
            Ok(settings) => HealthCheck {
                status: "ready",
                detail: format!("transfers enabled on {}", settings.blockchain),
            },
            Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
        };

        Self { inference, wallet }
    }
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let ready = state.inference.status == "ready" && state.wallet.status == "ready";

    Json(HealthResponse {
        ok: true,
        status: if ready { "ready" } else { "degraded" },
        service: "agentpay-server",
        inference: state.inference,
        wallet: state.wallet,
        checked_at: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use agentpay_core::config::AppConfig;
    use axum::{extract::State, Json};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_is_ok_but_degraded_without_credentials() {
        let Json(payload) = health(State(HealthState::from_config(&AppConfig::default()))).await;

        assert!(payload.ok);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.service, "agentpay-server");
        assert_eq!(payload.inference.status, "degraded");
        assert!(payload.inference.detail.contains("GEMINI_API_KEY"));
        assert_eq!(payload.wallet.status, "degraded");
    }

    #[tokio::test]
    async fn health_is_ready_when_every_collaborator_is_configured() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("gemini-key".to_string().into());
        config.wallet.api_key = Some("TEST_API_KEY:abc:def".to_string().into());
        config.wallet.entity_secret = Some("ab".repeat(32).into());
        config.wallet.agent_wallet_id = Some("agent-wallet".to_string());
        config.wallet.merchant_address = Some("0xmerchant".to_string());
        config.wallet.blockchain = Some("ARC-TESTNET".to_string());

        let Json(payload) = health(State(HealthState::from_config(&config))).await;

        assert!(payload.ok);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.wallet.detail, "transfers enabled on ARC-TESTNET");
        assert!(!payload.checked_at.is_empty());
    }
}
