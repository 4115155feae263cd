//! Response serialization for the request stream.
//!
//! Every response is a single JSON value followed by a newline and flushed
//! immediately, so a peer can read responses as soon as they are produced.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Machine-readable error codes sent to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The value was not an object carrying a string `method`.
    InvalidRequest,
    /// A protected method was called before the handshake succeeded.
    NotAuthenticated,
    /// A second handshake was attempted on an authenticated connection.
    AlreadyAuthenticated,
    /// No authenticator accepted the agent.
    AuthenticationFailed,
    /// No handler is bound to the method.
    UnknownMethod,
    /// The bound handler failed the call.
    HandlerFailed,
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotAuthenticated => "not_authenticated",
            Self::AlreadyAuthenticated => "already_authenticated",
            Self::AuthenticationFailed => "authentication_failed",
            Self::UnknownMethod => "unknown_method",
            Self::HandlerFailed => "handler_failed",
        }
    }
}

/// Errors raised while writing a response value.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The connection rejected the write.
    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),
}

#[derive(Serialize)]
struct ResultEnvelope<'a, T: Serialize + ?Sized> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    result: &'a T,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: &'a str,
}

/// Value-stream encoder bound to one connection.
///
/// The encoder counts the values it has written so the serve loop can check
/// that a handler reporting success actually produced a response.
pub struct ResponseEncoder {
    writer: Box<dyn Write + Send>,
    written: usize,
}

impl ResponseEncoder {
    /// Wraps the write side of a connection.
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Box::new(writer),
            written: 0,
        }
    }

    /// Writes any serializable value as one newline-terminated JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if serialization or the write fails.
    pub fn encode<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        let mut bytes = serde_json::to_vec(value)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Writes a `{"id":..,"result":..}` response.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if serialization or the write fails.
    pub fn write_result<T>(&mut self, id: Option<&Value>, result: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.encode(&ResultEnvelope { id, result })
    }

    /// Writes a `{"id":..,"error":{"code":..,"message":..}}` response.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if serialization or the write fails.
    pub fn write_error(
        &mut self,
        id: Option<&Value>,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), EncodeError> {
        self.encode(&ErrorEnvelope {
            id,
            error: ErrorBody { code, message },
        })
    }

    /// Number of values written so far.
    #[must_use]
    pub fn values_written(&self) -> usize {
        self.written
    }
}

impl std::fmt::Debug for ResponseEncoder {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ResponseEncoder")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}
