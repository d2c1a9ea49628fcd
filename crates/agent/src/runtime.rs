use std::sync::Arc;

use agentpay_core::config::WalletConfig;
use agentpay_core::{settle_usdc, ApplicationError, GuardedOutcome, WalletProvider};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::decision::{DecisionMode, DecisionRequester};
use crate::guardrails::GuardrailPolicy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    #[serde(flatten)]
    pub outcome: GuardedOutcome,
    pub tx_id: Option<String>,
    pub tx_link: Option<String>,
}

/// Requester, guardrail and wallet wired together. Holds no per-request state.
pub struct AgentRuntime {
    requester: DecisionRequester,
    guardrails: GuardrailPolicy,
    wallet: Arc<dyn WalletProvider>,
    wallet_config: WalletConfig,
}

impl AgentRuntime {
    pub fn new(
        requester: DecisionRequester,
        guardrails: GuardrailPolicy,
        wallet: Arc<dyn WalletProvider>,
        wallet_config: WalletConfig,
    ) -> Self {
        Self { requester, guardrails, wallet, wallet_config }
    }

    pub fn wallet(&self) -> &Arc<dyn WalletProvider> {
        &self.wallet
    }

    pub fn wallet_config(&self) -> &WalletConfig {
        &self.wallet_config
    }

    /// Pricing only. Never moves funds.
    pub async fn quote(&self, text: &str) -> Result<GuardedOutcome, ApplicationError> {
        let decision = self.requester.request(text, DecisionMode::AnalysisOnly).await?;
        Ok(self.guardrails.enforce(&decision))
    }

    /// Pricing followed by a transfer when the guarded outcome asks for one.
    pub async fn run(&self, text: &str) -> Result<RunOutcome, ApplicationError> {
        let decision = self.requester.request(text, DecisionMode::Full).await?;
        let outcome = self.guardrails.enforce(&decision);

        if !outcome.payment_required || outcome.amount_usdc <= Decimal::ZERO {
            info!(
                event_name = "agent.run.no_payment",
                complexity = %outcome.complexity,
                "no payment required"
            );
            return Ok(RunOutcome { outcome, tx_id: None, tx_link: None });
        }

        let settings = self.wallet_config.transfer_settings()?;
        let settlement = settle_usdc(self.wallet.as_ref(), &settings, outcome.amount_usdc).await?;

        info!(
            event_name = "agent.run.transfer_submitted",
            complexity = %outcome.complexity,
            amount_usdc = %outcome.amount_usdc,
            tx_id = %settlement.receipt.id,
            "usdc transfer submitted"
        );

        Ok(RunOutcome {
            outcome,
            tx_id: Some(settlement.receipt.id),
            tx_link: settlement.tx_link,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use agentpay_core::config::{AppConfig, WalletConfig};
    use agentpay_core::{
        ApplicationError, Complexity, Token, TokenBalance, TransferReceipt, TransferRequest,
        WalletProvider,
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use super::AgentRuntime;
    use crate::decision::tests::ScriptedLlm;
    use crate::decision::DecisionRequester;
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::GenerationOptions;

    #[derive(Default)]
    pub(crate) struct FakeWallet {
        pub(crate) transfers: Mutex<Vec<TransferRequest>>,
    }

    impl FakeWallet {
        pub(crate) fn transfers(&self) -> Vec<TransferRequest> {
            self.transfers.lock().map(|guard| guard.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl WalletProvider for FakeWallet {
        async fn list_balances(
            &self,
            _wallet_id: &str,
        ) -> Result<Vec<TokenBalance>, ApplicationError> {
            Ok(vec![
                TokenBalance {
                    token: Token {
                        id: "eth-token".to_string(),
                        symbol: Some("ETH".to_string()),
                        blockchain: Some("ARC-TESTNET".to_string()),
                        ..Token::default()
                    },
                    amount: "1".to_string(),
                    update_date: None,
                },
                TokenBalance {
                    token: Token {
                        id: "usdc-token".to_string(),
                        symbol: Some("USDC".to_string()),
                        blockchain: Some("ARC-TESTNET".to_string()),
                        ..Token::default()
                    },
                    amount: "10".to_string(),
                    update_date: None,
                },
            ])
        }

        async fn balances_payload(&self, wallet_id: &str) -> Result<Value, ApplicationError> {
            Ok(json!({ "walletId": wallet_id, "tokenBalances": [] }))
        }

        async fn transfer(
            &self,
            request: TransferRequest,
        ) -> Result<TransferReceipt, ApplicationError> {
            if let Ok(mut transfers) = self.transfers.lock() {
                transfers.push(request);
            }
            Ok(TransferReceipt {
                id: "tx-42".to_string(),
                state: Some("INITIATED".to_string()),
                tx_hash: Some("0xhash".to_string()),
            })
        }

        async fn get_transaction(&self, transaction_id: &str) -> Result<Value, ApplicationError> {
            Ok(json!({ "id": transaction_id, "state": "COMPLETE" }))
        }

        async fn get_wallet(&self, wallet_id: &str) -> Result<Value, ApplicationError> {
            Ok(json!({ "id": wallet_id }))
        }
    }

    pub(crate) fn wallet_config() -> WalletConfig {
        let mut wallet = AppConfig::default().wallet;
        wallet.agent_wallet_id = Some("agent-wallet".to_string());
        wallet.merchant_wallet_id = Some("merchant-wallet".to_string());
        wallet.merchant_address = Some("0xmerchant".to_string());
        wallet.blockchain = Some("ARC-TESTNET".to_string());
        wallet.explorer_tx_base = Some("https://explorer.test/tx/".to_string());
        wallet
    }

    pub(crate) fn runtime(
        replies: &[&str],
        wallet: Arc<FakeWallet>,
        wallet_config: WalletConfig,
    ) -> AgentRuntime {
        AgentRuntime::new(
            DecisionRequester::new(ScriptedLlm::replying(replies), GenerationOptions::default()),
            GuardrailPolicy::default(),
            wallet,
            wallet_config,
        )
    }

    #[tokio::test]
    async fn low_complexity_run_never_transfers() {
        let wallet = Arc::new(FakeWallet::default());
        let runtime = runtime(
            &[r#"{"complexity":"LOW","payment_required":true,"amount_usdc":5,"reason":"easy"}"#],
            wallet.clone(),
            wallet_config(),
        );

        let outcome = runtime.run("hello").await.expect("run succeeds");

        assert_eq!(outcome.outcome.complexity, Complexity::Low);
        assert!(!outcome.outcome.payment_required);
        assert_eq!(outcome.tx_id, None);
        assert_eq!(outcome.tx_link, None);
        assert!(wallet.transfers().is_empty());
    }

    #[tokio::test]
    async fn low_complexity_run_needs_no_transfer_settings() {
        let wallet = Arc::new(FakeWallet::default());
        let runtime = runtime(
            &[r#"{"complexity":"LOW","reason":"easy"}"#],
            wallet.clone(),
            AppConfig::default().wallet,
        );

        let outcome = runtime.run("hello").await.expect("run succeeds without wallet config");
        assert!(!outcome.outcome.payment_required);
    }

    #[tokio::test]
    async fn high_complexity_run_transfers_exactly_once() {
        let wallet = Arc::new(FakeWallet::default());
        let runtime = runtime(
            &[r#"{"complexity":"HIGH","payment_required":false,"amount_usdc":0,"reason":"hard","analysis":"a"}"#],
            wallet.clone(),
            wallet_config(),
        );

        let outcome = runtime.run("design a compiler").await.expect("run succeeds");

        let transfers = wallet.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, Decimal::new(10, 2));
        assert_eq!(transfers[0].token_id, "usdc-token");
        assert_eq!(transfers[0].wallet_id, "agent-wallet");
        assert_eq!(transfers[0].destination_address, "0xmerchant");

        assert_eq!(outcome.tx_id.as_deref(), Some("tx-42"));
        assert_eq!(outcome.tx_link.as_deref(), Some("https://explorer.test/tx/0xhash"));

        let body = serde_json::to_value(&outcome).expect("serializes");
        assert_eq!(body["complexity"], json!("HIGH"));
        assert_eq!(body["amount_usdc"], json!(0.1));
        assert_eq!(body["payment_required"], json!(true));
        assert_eq!(body["tx_id"], json!("tx-42"));
        assert_eq!(body["analysis"], json!("a"));
    }

    #[tokio::test]
    async fn paid_run_without_transfer_settings_is_a_configuration_error() {
        let wallet = Arc::new(FakeWallet::default());
        let runtime = runtime(
            &[r#"{"complexity":"MEDIUM","reason":"r"}"#],
            wallet.clone(),
            AppConfig::default().wallet,
        );

        let error = runtime.run("text").await.expect_err("settings missing");

        assert!(
            matches!(error, ApplicationError::Configuration(ref message) if message.contains("wallet.merchant_address"))
        );
        assert!(wallet.transfers().is_empty());
    }

    #[tokio::test]
    async fn quote_prices_without_transferring() {
        let wallet = Arc::new(FakeWallet::default());
        let runtime = runtime(
            &[r#"{"complexity":"MEDIUM","payment_required":false,"amount_usdc":0}"#],
            wallet.clone(),
            wallet_config(),
        );

        let outcome = runtime.quote("text").await.expect("quote succeeds");

        assert_eq!(outcome.complexity, Complexity::Medium);
        assert!(outcome.payment_required);
        assert_eq!(outcome.amount_usdc, Decimal::new(5, 2));
        assert_eq!(outcome.reason, "Pricing applied for MEDIUM");
        assert!(wallet.transfers().is_empty());
    }
}
