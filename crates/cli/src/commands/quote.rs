use std::sync::Arc;

use agentpay_agent::{
    DecisionMode, DecisionRequester, GeminiClient, GenerationOptions, GuardrailPolicy,
};
use agentpay_core::config::{AppConfig, LoadOptions};
use agentpay_core::{ApplicationError, GuardedOutcome};

use crate::commands::CommandResult;

const COMMAND: &str = "quote";

/// Classifies `text` and prints the guarded outcome. Never moves funds.
pub fn run(text: &str) -> CommandResult {
    if text.trim().is_empty() {
        return CommandResult::failure(COMMAND, "bad_request", "text is required", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_application_error(COMMAND, error.into()),
    };

    match super::block_on(COMMAND, quote(&config, text)) {
        Ok(Ok(outcome)) => {
            let message = format!(
                "{} complexity, {} USDC",
                outcome.complexity.as_str(),
                outcome.amount_usdc.normalize()
            );
            CommandResult::success_with_data(COMMAND, message, serde_json::to_value(&outcome).ok())
        }
        Ok(Err(error)) => CommandResult::from_application_error(COMMAND, error),
        Err(result) => result,
    }
}

async fn quote(config: &AppConfig, text: &str) -> Result<GuardedOutcome, ApplicationError> {
    config.llm.require_api_key()?;
    let llm = GeminiClient::from_config(&config.llm)?;
    let requester = DecisionRequester::new(
        Arc::new(llm),
        GenerationOptions::deterministic(config.llm.max_output_tokens),
    );

    let decision = requester.request(text, DecisionMode::AnalysisOnly).await?;
    Ok(GuardrailPolicy::default().enforce(&decision))
}
