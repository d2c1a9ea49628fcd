use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::config::TransferSettings;
use crate::domain::wallet::{
    find_usdc_token_id, token_symbols, TokenBalance, TransferReceipt, TransferRequest,
};
use crate::errors::ApplicationError;

/// Custodial wallet provider. Implementations own any provider SDK or API
/// version differences; callers only ever see one `transfer`.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn list_balances(&self, wallet_id: &str) -> Result<Vec<TokenBalance>, ApplicationError>;

    /// Provider balance payload as returned, for display endpoints.
    async fn balances_payload(&self, wallet_id: &str) -> Result<Value, ApplicationError>;

    async fn transfer(&self, request: TransferRequest)
        -> Result<TransferReceipt, ApplicationError>;

    async fn get_transaction(&self, transaction_id: &str) -> Result<Value, ApplicationError>;

    async fn get_wallet(&self, wallet_id: &str) -> Result<Value, ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub receipt: TransferReceipt,
    pub tx_link: Option<String>,
}

/// Moves `amount` USDC from the configured agent wallet to the merchant.
/// Each call uses a fresh idempotency key.
pub async fn settle_usdc<W>(
    wallet: &W,
    settings: &TransferSettings,
    amount: Decimal,
) -> Result<Settlement, ApplicationError>
where
    W: WalletProvider + ?Sized,
{
    let balances = wallet.list_balances(&settings.source_wallet_id).await?;
    let token_id = find_usdc_token_id(&balances, &settings.blockchain).ok_or_else(|| {
        ApplicationError::Integration(format!(
            "USDC tokenId not found on {}. Wallet tokens: {:?}",
            settings.blockchain,
            token_symbols(&balances)
        ))
    })?;

    let receipt = wallet
        .transfer(TransferRequest {
            wallet_id: settings.source_wallet_id.clone(),
            blockchain: settings.blockchain.clone(),
            destination_address: settings.destination_address.clone(),
            token_id: token_id.to_string(),
            amount,
            fee_level: settings.fee_level.as_str().to_string(),
            idempotency_key: Uuid::new_v4().to_string(),
        })
        .await?;

    let tx_link = match (&settings.explorer_tx_base, &receipt.tx_hash) {
        (Some(base), Some(hash)) if !hash.is_empty() => Some(format!("{base}{hash}")),
        _ => None,
    };

    Ok(Settlement { receipt, tx_link })
}
