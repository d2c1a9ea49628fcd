use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Classification recovered from model output. Nothing here is trusted:
/// any field may be absent, and `payment_required`/`amount_usdc` are advisory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub complexity: Option<String>,
    pub payment_required: Option<bool>,
    pub amount_usdc: Option<f64>,
    pub reason: Option<String>,
    pub analysis: Option<String>,
}

impl Decision {
    pub fn has_any_field(&self) -> bool {
        self.complexity.is_some()
            || self.payment_required.is_some()
            || self.amount_usdc.is_some()
            || self.reason.is_some()
            || self.analysis.is_some()
    }

    /// Drops the model's pricing suggestion and guarantees an analysis string.
    pub fn without_advisory_pricing(self) -> Self {
        Self {
            payment_required: None,
            amount_usdc: None,
            analysis: Some(self.analysis.unwrap_or_default()),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownComplexity(pub String);

impl fmt::Display for UnknownComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown complexity `{}` (expected LOW|MEDIUM|HIGH)", self.0)
    }
}

impl std::error::Error for UnknownComplexity {}

impl FromStr for Complexity {
    type Err = UnknownComplexity;

    /// Case-insensitive, but surrounding whitespace is not forgiven.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(UnknownComplexity(value.to_string())),
        }
    }
}

/// Authoritative payment decision. `amount_usdc` comes from the price table
/// only, and `payment_required` is exactly `amount_usdc > 0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GuardedOutcome {
    pub complexity: Complexity,
    pub payment_required: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_usdc: Decimal,
    pub reason: String,
    pub analysis: String,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{Complexity, Decision, GuardedOutcome};

    #[test]
    fn complexity_parses_case_insensitively() {
        assert_eq!("high".parse::<Complexity>(), Ok(Complexity::High));
        assert_eq!("Medium".parse::<Complexity>(), Ok(Complexity::Medium));
        assert!(" LOW".parse::<Complexity>().is_err());
        assert!("urgent".parse::<Complexity>().is_err());
        assert!("".parse::<Complexity>().is_err());
    }

    #[test]
    fn advisory_pricing_is_dropped_but_analysis_is_kept() {
        let decision = Decision {
            complexity: Some("HIGH".to_string()),
            payment_required: Some(false),
            amount_usdc: Some(99.0),
            reason: None,
            analysis: None,
        }
        .without_advisory_pricing();

        assert_eq!(decision.payment_required, None);
        assert_eq!(decision.amount_usdc, None);
        assert_eq!(decision.analysis.as_deref(), Some(""));
        assert_eq!(decision.complexity.as_deref(), Some("HIGH"));
    }

    #[test]
    fn guarded_outcome_serializes_amount_as_number() {
        let outcome = GuardedOutcome {
            complexity: Complexity::Medium,
            payment_required: true,
            amount_usdc: Decimal::new(5, 2),
            reason: "r".to_string(),
            analysis: "a".to_string(),
        };

        let value = serde_json::to_value(&outcome).expect("serializes");
        assert_eq!(value["complexity"], json!("MEDIUM"));
        assert_eq!(value["amount_usdc"], json!(0.05));
        assert_eq!(value["payment_required"], json!(true));
    }
}
