//! Error types for the pet diary client.
//!
//! # Design
//! Every failure a store can observe is a variant of `ApiError`. The enum is
//! `Clone + PartialEq` so a store can keep the last failure in its published
//! state and tests can compare it directly. Transport and codec errors are
//! captured as their display string for the same reason.

use thiserror::Error;

/// Errors returned by the client, the adapter and every store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Required local input was missing or invalid; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation needs a stored auth token and there is none.
    #[error("sign-in required")]
    AuthRequired,

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The persisted key-value store failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// A newer request for the same entity was issued before this one
    /// resolved, so its response was not applied.
    #[error("response superseded by a newer request")]
    Superseded,

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http { status: 404, .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. }) || matches!(self, ApiError::AuthRequired)
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_a_404_http_error() {
        let err = ApiError::Http {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!ApiError::Http {
            status: 500,
            body: String::new()
        }
        .is_not_found());
    }

    #[test]
    fn display_includes_status_and_body() {
        let err = ApiError::Http {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[test]
    fn auth_required_counts_as_unauthorized() {
        assert!(ApiError::AuthRequired.is_unauthorized());
        assert!(ApiError::Http {
            status: 401,
            body: String::new()
        }
        .is_unauthorized());
    }
}
