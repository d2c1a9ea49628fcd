use std::sync::Arc;

use agentpay_agent::{
    AgentRuntime, DecisionRequester, GeminiClient, GenerationOptions, GuardrailPolicy,
};
use agentpay_core::config::{AppConfig, ServerConfig};
use agentpay_core::ApplicationError;
use agentpay_wallet::CircleClient;
use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::api::{self, ApiState};
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("collaborator client setup failed: {0}")]
    Client(#[from] ApplicationError),
    #[error("server.cors_origin `{0}` is not a valid header value")]
    InvalidCorsOrigin(String),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let llm = GeminiClient::from_config(&config.llm)?;
    let wallet = CircleClient::from_config(&config.wallet)?;
    let requester = DecisionRequester::new(
        Arc::new(llm),
        GenerationOptions::deterministic(config.llm.max_output_tokens),
    );
    let runtime = AgentRuntime::new(
        requester,
        GuardrailPolicy::default(),
        Arc::new(wallet),
        config.wallet.clone(),
    );

    let state =
        ApiState { runtime: Arc::new(runtime), health: HealthState::from_config(&config) };
    let router = api::router(state)
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(cors_layer(&config.server)?)
        .layer(TraceLayer::new_for_http());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "application bootstrap complete"
    );

    Ok(Application { config, router })
}

fn cors_layer(server: &ServerConfig) -> Result<CorsLayer, BootstrapError> {
    let origin = server.cors_origin.trim();
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin)
            .map_err(|_| BootstrapError::InvalidCorsOrigin(origin.to_string()))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any))
}
