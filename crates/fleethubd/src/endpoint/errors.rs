//! Error types for method binding and request dispatch.

use thiserror::Error;

use super::response::{EncodeError, ErrorCode};

/// Errors returned synchronously when configuring a server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The accept loop is running; the table is frozen.
    #[error("server is already started; can't bind more handlers")]
    AlreadyStarted,
    /// A handler is already bound to this method name.
    #[error("a handler for method '{method}' already exists")]
    DuplicateMethod { method: String },
}

impl BindError {
    /// Creates a duplicate method error.
    pub fn duplicate_method(method: impl Into<String>) -> Self {
        Self::DuplicateMethod {
            method: method.into(),
        }
    }
}

/// Errors surfaced while dispatching a single request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The decoded value is not a valid request envelope.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The request params do not match what the handler expects.
    #[error("invalid params for '{method}': {message}")]
    InvalidParams { method: String, message: String },

    /// No handler is bound to the requested method.
    #[error("unknown method '{method}'")]
    UnknownMethod { method: String },

    /// Writing a response failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl DispatchError {
    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an invalid params error.
    pub fn invalid_params(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown method error.
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Wire error code reported to the peer for this error.
    ///
    /// Returns `None` for transport failures, which cannot be reported.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::InvalidRequest { .. } | Self::InvalidParams { .. } => {
                Some(ErrorCode::InvalidRequest)
            }
            Self::UnknownMethod { .. } => Some(ErrorCode::UnknownMethod),
            Self::Encode(_) => None,
        }
    }
}
