use serde_json::{json, Value};
use thiserror::Error;

/// Failure of a single upstream call or of the validation in front of it.
///
/// Tool handlers never propagate this to the dispatcher; it is rendered into
/// an `{"error": message}` payload at the tool boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    MissingCredential { message: &'static str },
    #[error("{message}")]
    Validation { message: String },
    #[error("HTTP error occurred: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP error occurred: {status} for url {url}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("{service} API error: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("authentication error: {message}")]
    Auth { message: String },
    #[error("invalid response: {message}")]
    Decode { message: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn missing_credential(message: &'static str) -> Self {
        Self::MissingCredential { message }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// `true` when the call was rejected before anything went over the wire.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::Validation { .. }
        )
    }

    pub fn to_payload(&self) -> Value {
        json!({ "error": self.to_string() })
    }

    pub fn to_list_payload(&self) -> Value {
        json!([{ "error": self.to_string() }])
    }
}

/// Dispatch-level failure surfaced as a JSON-RPC error response.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },
}

impl ToolError {
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    pub fn invalid_arguments(err: serde_json::Error) -> Self {
        Self::InvalidArguments {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool `{name}` is already registered")]
    DuplicateTool { name: String },
}

/// Anything that stops the server before the first line is read.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("failed to build the HTTP client: {0}")]
    Http(#[from] ApiError),
    #[error("failed to register tools: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Transport(#[from] crate::mcp::transport::TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_display_message() {
        let err = ApiError::validation("At least one field (state, title, or body) must be provided");
        assert_eq!(
            err.to_payload(),
            json!({"error": "At least one field (state, title, or body) must be provided"})
        );
        assert!(err.is_local());
    }

    #[test]
    fn list_payload_wraps_error_in_array() {
        let err = ApiError::upstream("Slack", "channel_not_found");
        assert_eq!(
            err.to_list_payload(),
            json!([{"error": "Slack API error: channel_not_found"}])
        );
        assert!(!err.is_local());
    }
}
