use agentpay_core::config::{AppConfig, LoadOptions};
use agentpay_wallet::CircleClient;
use serde_json::json;

use crate::commands::CommandResult;

const COMMAND: &str = "entity-ciphertext";

/// Prints a fresh entity secret ciphertext for registration in the wallet console.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_application_error(COMMAND, error.into()),
    };

    let client = match CircleClient::from_config(&config.wallet) {
        Ok(client) => client,
        Err(error) => return CommandResult::from_application_error(COMMAND, error),
    };

    match super::block_on(COMMAND, client.entity_secret_ciphertext()) {
        Ok(Ok(ciphertext)) => CommandResult::success_with_data(
            COMMAND,
            "entity secret ciphertext generated",
            Some(json!({ "ciphertext": ciphertext })),
        ),
        Ok(Err(error)) => CommandResult::from_application_error(COMMAND, error),
        Err(result) => result,
    }
}
