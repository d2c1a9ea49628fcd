use agentpay_core::config::{AppConfig, LoadOptions, WalletConfig};
use agentpay_core::ApplicationError;
use agentpay_wallet::{generate_entity_secret, CircleClient};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::commands::CommandResult;

const COMMAND: &str = "init-wallets";

pub const DEFAULT_WALLET_SET_NAME: &str = "agent-wallet-set";

struct Provisioned {
    entity_secret: SecretString,
    generated_secret: bool,
    wallet_set_id: String,
    agent_wallet_id: String,
    merchant_wallet_id: String,
    merchant_address: Option<String>,
}

/// Creates a wallet set holding an agent wallet and a merchant wallet, then
/// prints the environment lines an operator needs to persist.
pub fn run(wallet_set_name: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_application_error(COMMAND, error.into()),
    };

    match super::block_on(COMMAND, provision(config.wallet, wallet_set_name)) {
        Ok(Ok(provisioned)) => {
            let lines = env_lines(&provisioned);
            let message = format!("add these lines to your .env:\n{}", lines.join("\n"));
            CommandResult::success_with_data(
                COMMAND,
                message,
                Some(json!({
                    "wallet_set_id": provisioned.wallet_set_id,
                    "agent_wallet_id": provisioned.agent_wallet_id,
                    "merchant_wallet_id": provisioned.merchant_wallet_id,
                    "merchant_address": provisioned.merchant_address,
                    "generated_entity_secret": provisioned.generated_secret,
                })),
            )
        }
        Ok(Err(error)) => CommandResult::from_application_error(COMMAND, error),
        Err(result) => result,
    }
}

async fn provision(
    mut wallet: WalletConfig,
    wallet_set_name: &str,
) -> Result<Provisioned, ApplicationError> {
    wallet.require_api_key()?;
    let blockchain = wallet.require_blockchain()?.to_string();

    let generated_secret = wallet.require_entity_secret().is_err();
    if generated_secret {
        wallet.entity_secret = Some(SecretString::from(generate_entity_secret()));
    }
    let entity_secret = wallet.require_entity_secret()?.clone();

    let client = CircleClient::from_config(&wallet)?;
    let wallet_set_id = client.create_wallet_set(wallet_set_name).await?;
    let mut wallets = client.create_wallets(&wallet_set_id, &blockchain, 2).await?.into_iter();

    let (Some(agent), Some(merchant)) = (wallets.next(), wallets.next()) else {
        return Err(ApplicationError::Integration(
            "wallet creation returned fewer than two wallets".to_string(),
        ));
    };

    Ok(Provisioned {
        entity_secret,
        generated_secret,
        wallet_set_id,
        agent_wallet_id: agent.id,
        merchant_wallet_id: merchant.id,
        merchant_address: merchant.address,
    })
}

fn env_lines(provisioned: &Provisioned) -> Vec<String> {
    let mut lines = vec![
        format!("CIRCLE_ENTITY_SECRET={}", provisioned.entity_secret.expose_secret()),
        format!("CIRCLE_WALLET_SET_ID={}", provisioned.wallet_set_id),
        format!("CIRCLE_AGENT_WALLET_ID={}", provisioned.agent_wallet_id),
        format!("CIRCLE_MERCHANT_WALLET_ID={}", provisioned.merchant_wallet_id),
    ];
    if let Some(address) = &provisioned.merchant_address {
        lines.push(format!("MERCHANT_WALLET_ADDRESS={address}"));
    }
    lines
}
