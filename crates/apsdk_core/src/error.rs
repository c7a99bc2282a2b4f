//! Error types for the SDK core.

use apsdk_protocol::{ProtocolError, Status};
use thiserror::Error;

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;

/// Errors surfaced to callers of the SDK.
///
/// Nothing is retried internally. Every failure reaches the caller, who can
/// resend the same uncommitted delta, re-fetch after a conflict, or give up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdkError {
    /// Local input was rejected before any network call.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// A stored value could not be parsed as the requested type.
    #[error("property {name} has value {value:?} which is not a valid {expected}")]
    InvalidFormat {
        /// Property name.
        name: String,
        /// Raw stored value.
        value: String,
        /// Name of the requested type.
        expected: String,
    },

    /// The expected revision did not match the server's revision.
    #[error("revision conflict ({code}): {message}")]
    Concurrency {
        /// Server status code.
        code: String,
        /// Server message.
        message: String,
    },

    /// The server has no record with the requested id.
    #[error("not found ({code}): {message}")]
    NotFound {
        /// Server status code.
        code: String,
        /// Server message.
        message: String,
    },

    /// The server reported a failure.
    #[error("server fault ({code}): {message}")]
    Fault {
        /// Server status code.
        code: String,
        /// Server message.
        message: String,
        /// Server reference id, if any.
        reference_id: Option<String>,
    },

    /// The server reported success but broke the response contract.
    #[error("internal consistency error: {message}")]
    InternalConsistency {
        /// Description of the violation.
        message: String,
    },

    /// An entity payload had a missing or unexpected discriminator.
    #[error("schema error: {0}")]
    Schema(String),

    /// A payload could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },
}

impl SdkError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(
        name: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidFormat {
            name: name.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Creates an internal consistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: message.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Maps a failed platform status to an error.
    pub fn from_status(status: &Status) -> Self {
        let code = status.code.clone();
        let message = status
            .message
            .clone()
            .unwrap_or_else(|| "no message".to_string());
        match status.code.as_str() {
            Status::NOT_FOUND => Self::NotFound { code, message },
            Status::CONFLICT => Self::Concurrency { code, message },
            _ => Self::Fault {
                code,
                message,
                reference_id: status.reference_id.clone(),
            },
        }
    }

    /// Returns true for errors raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidFormat { .. })
    }

    /// Returns true for server failures other than revision conflicts.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. } | Self::NotFound { .. })
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { retryable: true, .. })
    }

    /// Returns the server status code, if the server produced this error.
    pub fn status_code(&self) -> Option<&str> {
        match self {
            Self::Concurrency { code, .. }
            | Self::NotFound { code, .. }
            | Self::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<ProtocolError> for SdkError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Schema { message } => SdkError::Schema(message),
            other => SdkError::Protocol(other),
        }
    }
}
