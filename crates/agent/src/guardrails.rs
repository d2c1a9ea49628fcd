use agentpay_core::pricing::clamp_charge;
use agentpay_core::{Complexity, Decision, GuardedOutcome, PriceTable};
use rust_decimal::Decimal;

pub const INVALID_COMPLEXITY_REASON: &str = "Invalid complexity from model; forced safe default";

/// Turns an untrusted model decision into the payment decision the server
/// acts on. The model never sets a price: `payment_required` and
/// `amount_usdc` from the model are ignored, and the amount always comes
/// from the price table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub prices: PriceTable,
}

impl GuardrailPolicy {
    pub fn new(prices: PriceTable) -> Self {
        Self { prices }
    }

    pub fn enforce(&self, decision: &Decision) -> GuardedOutcome {
        let analysis = decision.analysis.clone().unwrap_or_default();

        let complexity = match decision.complexity.as_deref().map(str::parse::<Complexity>) {
            Some(Ok(complexity)) => complexity,
            _ => {
                return GuardedOutcome {
                    complexity: Complexity::Low,
                    payment_required: false,
                    amount_usdc: Decimal::ZERO,
                    reason: INVALID_COMPLEXITY_REASON.to_string(),
                    analysis,
                };
            }
        };

        let amount_usdc = clamp_charge(self.prices.price(complexity));
        let reason = decision
            .reason
            .as_deref()
            .filter(|reason| !reason.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Pricing applied for {complexity}"));

        GuardedOutcome {
            complexity,
            payment_required: amount_usdc > Decimal::ZERO,
            amount_usdc,
            reason,
            analysis,
        }
    }
}

/// Enforces the default price table.
pub fn enforce_guardrails(decision: &Decision) -> GuardedOutcome {
    GuardrailPolicy::default().enforce(decision)
}
