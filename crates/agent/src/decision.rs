use std::sync::Arc;

use agentpay_core::parse::{looks_truncated, parse_structured, raw_preview, scrape_fields};
use agentpay_core::{ApplicationError, Decision};
use tracing::{debug, warn};

use crate::llm::{GenerationOptions, LlmClient};

/// Which fields of the recovered decision the caller gets back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionMode {
    /// Advisory pricing fields are dropped; the guardrail owns pricing.
    AnalysisOnly,
    Full,
}

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"You are a backend pricing and analysis engine.

OUTPUT RULES:
- Output ONLY one valid JSON object.
- No markdown, no code fences.
- No text before or after the JSON.
- Close every brace and string. Do not truncate.

JSON SCHEMA (EXACT KEYS):
{{
  "complexity": "LOW" | "MEDIUM" | "HIGH",
  "payment_required": boolean,
  "amount_usdc": number,
  "reason": string,
  "analysis": string
}}

PRICING (ENFORCED BY THE SERVER):
LOW => 0.00 (payment_required false)
MEDIUM => 0.05
HIGH => 0.10

USER TEXT:
{text}

RETURN ONLY JSON."#
    )
}

/// Asks the model for a decision and repairs whatever comes back.
///
/// At most two model calls are made per request: the second only when the
/// first reply fails structured parsing and looks truncated.
pub struct DecisionRequester {
    client: Arc<dyn LlmClient>,
    options: GenerationOptions,
}

impl DecisionRequester {
    pub fn new(client: Arc<dyn LlmClient>, options: GenerationOptions) -> Self {
        Self { client, options }
    }

    pub async fn request(
        &self,
        text: &str,
        mode: DecisionMode,
    ) -> Result<Decision, ApplicationError> {
        let prompt = build_prompt(text);

        let mut raw = self.client.generate(&prompt, &self.options).await?;
        let mut decision = parse_structured(&raw);

        if decision.is_none() && looks_truncated(&raw) {
            warn!(
                event_name = "agent.decision.retry_truncated",
                raw_len = raw.len(),
                "model output looks truncated, retrying once"
            );
            raw = self.client.generate(&prompt, &self.options).await?;
            decision = parse_structured(&raw);
        }

        let decision = match decision {
            Some(decision) => decision,
            None => {
                warn!(
                    event_name = "agent.decision.scrape_fallback",
                    raw_len = raw.len(),
                    "model output is not valid JSON, scraping fields"
                );
                scrape_fields(&raw).ok_or_else(|| {
                    let (preview, truncated) = raw_preview(&raw);
                    ApplicationError::ModelOutputInvalid { preview, truncated }
                })?
            }
        };

        debug!(
            event_name = "agent.decision.parsed",
            complexity = decision.complexity.as_deref().unwrap_or("<none>"),
            "model decision recovered"
        );

        Ok(match mode {
            DecisionMode::AnalysisOnly => decision.without_advisory_pricing(),
            DecisionMode::Full => decision,
        })
    }
}
