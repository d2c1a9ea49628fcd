use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;

/// Upstream service a transport failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    Inference,
    Wallet,
}

impl Collaborator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inference => "inference",
            Self::Wallet => "wallet",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransportError {
    pub collaborator: Collaborator,
    pub status: Option<u16>,
    pub message: String,
    pub details: Option<Value>,
}

impl TransportError {
    pub fn status(collaborator: Collaborator, status: u16, message: impl Into<String>) -> Self {
        Self { collaborator, status: Some(status), message: message.into(), details: None }
    }

    pub fn network(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self { collaborator, status: None, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} transport failure", self.collaborator)?;
        if let Some(status) = self.status {
            write!(f, " status={status}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for TransportError {}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(
        "model output was not valid JSON. Raw preview:\n{preview}{ellipsis}",
        ellipsis = if *.truncated { "..." } else { "" }
    )]
    ModelOutputInvalid { preview: String, truncated: bool },
    #[error("integration failure: {0}")]
    Integration(String),
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, status: u16, details: Option<Value>, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::BadGateway { status, .. } => *status,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::BadGateway { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::BadGateway { details, .. } => details.as_ref(),
            Self::BadRequest { .. } | Self::Internal { .. } => None,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        match value {
            ApplicationError::Configuration(_) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Transport(transport) => {
                let status = transport
                    .status
                    .filter(|status| (400..600).contains(status))
                    .unwrap_or(502);
                Self::BadGateway {
                    message,
                    status,
                    details: transport.details,
                    correlation_id: "unassigned".to_owned(),
                }
            }
            ApplicationError::ModelOutputInvalid { .. } | ApplicationError::Integration(_) => {
                Self::BadGateway {
                    message,
                    status: 502,
                    details: None,
                    correlation_id: "unassigned".to_owned(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::config::ConfigError;
    use crate::errors::{ApplicationError, Collaborator, InterfaceError, TransportError};

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::from(ConfigError::MissingRequired(vec![
            "llm.api_key (set AGENTPAY_LLM_API_KEY or GEMINI_API_KEY)".to_owned(),
        ]))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Internal { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.status_code(), 500);
        assert!(interface.message().contains("llm.api_key"));
    }

    #[test]
    fn upstream_error_status_is_surfaced() {
        let transport = TransportError::status(Collaborator::Wallet, 404, "wallet not found")
            .with_details(json!({"code": 156004}));
        let interface = ApplicationError::from(transport).into_interface("req-2");

        assert_eq!(interface.status_code(), 404);
        assert_eq!(interface.details(), Some(&json!({"code": 156004})));
        assert!(interface.message().contains("status=404"));
    }

    #[test]
    fn network_failure_maps_to_bad_gateway() {
        let transport = TransportError::network(Collaborator::Inference, "connection refused");
        let interface = ApplicationError::from(transport).into_interface("req-3");

        assert_eq!(interface.status_code(), 502);
        assert!(interface.message().contains("inference transport failure"));
    }

    #[test]
    fn model_output_invalid_renders_preview_with_ellipsis() {
        let error = ApplicationError::ModelOutputInvalid {
            preview: "not json at all".to_owned(),
            truncated: true,
        };
        let message = error.to_string();

        assert!(message.ends_with("not json at all..."));
        assert_eq!(error.into_interface("req-4").status_code(), 502);
    }

    #[test]
    fn bad_request_keeps_its_message() {
        let interface = InterfaceError::bad_request("text is required", "req-5");

        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.message(), "text is required");
        assert_eq!(interface.correlation_id(), "req-5");
    }
}
