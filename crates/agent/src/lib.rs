//! Agent runtime: model-backed classification with a deterministic price gate.
//!
//! The flow for one request:
//! 1. **Decision request** (`decision`) - prompt the model, repair its reply
//!    into a `Decision`, retrying once when the reply looks truncated.
//! 2. **Guardrail enforcement** (`guardrails`) - map the decision onto the
//!    fixed price table.
//! 3. **Settlement** (`runtime`) - transfer USDC only when the guarded
//!    outcome requires payment.
//!
//! The model is a classifier only. It never decides amounts.

pub mod decision;
pub mod guardrails;
pub mod llm;
pub mod runtime;

pub use decision::{build_prompt, DecisionMode, DecisionRequester};
pub use guardrails::{enforce_guardrails, GuardrailPolicy, INVALID_COMPLEXITY_REASON};
pub use llm::{GeminiClient, GenerationOptions, LlmClient};
pub use runtime::{AgentRuntime, RunOutcome};
