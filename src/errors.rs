//! Unified error types for the sync layer.
//!
//! Errors fall into two families. Caller-side errors (`Validation`,
//! `MalformedPayload`, `LocalPrecondition`, `SettingsAlreadyInitialized`) are
//! bugs in the calling code or the payload and never trigger the fallback
//! navigation. Session errors (`Transport`, `ProtocolConfusion`, `Network`)
//! propagate to the guard layer, which redirects away from the route.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A domain invariant was violated while building or updating a model.
    #[error("Invalid value for `{field}`: {constraint}")]
    Validation {
        field: &'static str,
        constraint: String,
    },

    /// The server answered with a non-success status.
    #[error("Remote service returned status {status}")]
    Transport { status: u16, details: Option<Value> },

    /// A markup document came back where JSON was expected.
    #[error("Expected JSON from {path} but received markup ({content_type})")]
    ProtocolConfusion { path: String, content_type: String },

    /// The server answered 204 where a value was required.
    #[error("No content returned for {what}")]
    EmptyResult { what: &'static str },

    /// The body was not JSON, or lacked the expected top-level key.
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    /// Rejected before any network call was made.
    #[error("Precondition failed: {message}")]
    LocalPrecondition { message: String },

    #[error("Settings are already initialized")]
    SettingsAlreadyInitialized,

    /// The transport primitive could not complete the request.
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Navigation failed: {message}")]
    Navigation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn validation(field: &'static str, constraint: impl Into<String>) -> Self {
        Self::Validation {
            field,
            constraint: constraint.into(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::LocalPrecondition {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Whether the gateway should run the fallback navigation for this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ProtocolConfusion { .. } | Self::Network { .. })
    }

    /// Whether this error reflects a caller bug rather than a session failure.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::MalformedPayload { .. }
                | Self::LocalPrecondition { .. }
                | Self::SettingsAlreadyInitialized
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Network {
            message: value.to_string(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let confusion = Error::ProtocolConfusion {
            path: "/api/moneyboxes".to_string(),
            content_type: "text/html".to_string(),
        };
        assert!(confusion.is_fatal());
        assert!(!confusion.is_caller_error());

        let network = Error::Network {
            message: "connection refused".to_string(),
        };
        assert!(network.is_fatal());

        let transport = Error::Transport {
            status: 404,
            details: None,
        };
        assert!(!transport.is_fatal());
        assert!(!transport.is_caller_error());
    }

    #[test]
    fn test_caller_errors_are_not_fatal() {
        for err in [
            Error::validation("name", "must not be empty"),
            Error::precondition("empty patch"),
            Error::malformed("missing key"),
            Error::SettingsAlreadyInitialized,
        ] {
            assert!(err.is_caller_error(), "{err}");
            assert!(!err.is_fatal(), "{err}");
        }
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("balance", "must be >= 0");
        assert_eq!(err.to_string(), "Invalid value for `balance`: must be >= 0");
    }
}
