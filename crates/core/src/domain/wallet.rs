use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub blockchain: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub is_native: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub token: Token,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub update_date: Option<String>,
}

/// One transfer instruction for the wallet provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub wallet_id: String,
    pub blockchain: String,
    pub destination_address: String,
    pub token_id: String,
    pub amount: Decimal,
    pub fee_level: String,
    pub idempotency_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: String,
    pub state: Option<String>,
    pub tx_hash: Option<String>,
}

/// Picks the USDC token on `blockchain`. Symbols such as `USDC-TESTNET` and
/// `USDC.e` match too.
pub fn find_usdc_token_id<'a>(balances: &'a [TokenBalance], blockchain: &str) -> Option<&'a str> {
    let blockchain = blockchain.trim().to_uppercase();
    balances
        .iter()
        .filter(|balance| {
            balance.token.blockchain.as_deref().unwrap_or_default().to_uppercase() == blockchain
        })
        .find(|balance| {
            balance.token.symbol.as_deref().unwrap_or_default().to_uppercase().contains("USDC")
        })
        .map(|balance| balance.token.id.as_str())
        .filter(|id| !id.is_empty())
}

pub fn token_symbols(balances: &[TokenBalance]) -> Vec<&str> {
    balances.iter().filter_map(|balance| balance.token.symbol.as_deref()).collect()
}
