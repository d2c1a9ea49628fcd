use std::sync::Arc;

use agentpay_agent::{AgentRuntime, RunOutcome};
use agentpay_core::{ApplicationError, Complexity, InterfaceError, TokenBalance};
use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::health::{self, HealthState};

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub health: HealthState,
}

impl FromRef<ApiState> for HealthState {
    fn from_ref(state: &ApiState) -> Self {
        state.health.clone()
    }
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct QuoteResponse {
    pub payment_required: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_usdc: Decimal,
    pub complexity: Complexity,
    pub reason: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct BalanceResponse {
    #[serde(rename = "walletId")]
    pub wallet_id: String,
    pub balances: Vec<TokenBalance>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/quote", post(quote))
        .route("/run", post(run))
        .route("/status/{id}", get(transaction_status))
        .route("/balance", get(agent_balance))
        .route("/wallet", get(agent_wallet))
        .route("/wallets/balances", get(wallet_balances))
        .with_state(state)
}

pub async fn quote(
    State(state): State<ApiState>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> ApiResult<QuoteResponse> {
    let text = required_text("/quote", payload)?;
    let outcome = state.runtime.quote(&text).await.map_err(|error| failure("/quote", error))?;

    Ok(Json(QuoteResponse {
        payment_required: outcome.payment_required,
        amount_usdc: outcome.amount_usdc,
        complexity: outcome.complexity,
        reason: outcome.reason,
    }))
}

pub async fn run(
    State(state): State<ApiState>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> ApiResult<RunOutcome> {
    let text = required_text("/run", payload)?;
    let outcome = state.runtime.run(&text).await.map_err(|error| failure("/run", error))?;

    info!(
        event_name = "api.run.completed",
        complexity = %outcome.outcome.complexity,
        payment_required = outcome.outcome.payment_required,
        tx_id = outcome.tx_id.as_deref().unwrap_or("none"),
        "run completed"
    );
    Ok(Json(outcome))
}

pub async fn transaction_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let transaction = state
        .runtime
        .wallet()
        .get_transaction(&id)
        .await
        .map_err(|error| failure("/status/{id}", error))?;
    Ok(Json(json!({ "transaction": transaction })))
}

pub async fn agent_balance(State(state): State<ApiState>) -> ApiResult<BalanceResponse> {
    let result = async {
        let wallet_id = state.runtime.wallet_config().require_agent_wallet_id()?.to_string();
        let balances = state.runtime.wallet().list_balances(&wallet_id).await?;
        Ok::<_, ApplicationError>(BalanceResponse { wallet_id, balances })
    }
    .await;

    result.map(Json).map_err(|error| failure("/balance", error))
}

pub async fn agent_wallet(State(state): State<ApiState>) -> ApiResult<Value> {
    let result: Result<Value, ApplicationError> = async {
        let wallet_id = state.runtime.wallet_config().require_agent_wallet_id()?;
        state.runtime.wallet().get_wallet(wallet_id).await
    }
    .await;

    result.map(Json).map_err(|error| failure("/wallet", error))
}

/// Raw provider payloads for both wallets, fetched one after the other.
pub async fn wallet_balances(State(state): State<ApiState>) -> ApiResult<Value> {
    let result = async {
        let (agent_id, merchant_id) = state.runtime.wallet_config().require_wallet_pair()?;
        let wallet = state.runtime.wallet();
        let agent = wallet.balances_payload(agent_id).await?;
        let merchant = wallet.balances_payload(merchant_id).await?;
        Ok::<_, ApplicationError>(json!({ "agent": agent, "merchant": merchant }))
    }
    .await;

    result.map(Json).map_err(|error| failure("/wallets/balances", error))
}

fn required_text(
    route: &'static str,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<String, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = %correlation_id,
                route,
                error = %rejection.body_text(),
                "request body rejected"
            );
            return Err(bad_request(rejection.body_text(), correlation_id));
        }
    };

    match request.text {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(bad_request("text is required".to_string(), correlation_id)),
    }
}

fn bad_request(message: String, correlation_id: String) -> (StatusCode, Json<ApiError>) {
    render(InterfaceError::bad_request(message, correlation_id))
}

fn failure(route: &'static str, error: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().to_string();
    error!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        route,
        error = %error,
        "request failed"
    );

    render(error.into_interface(correlation_id))
}

fn render(interface: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(interface.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        Json(ApiError {
            error: interface.message().to_string(),
            details: interface.details().cloned(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}
