//! Single-use write handle for authenticators.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::endpoint::{EncodeError, ResponseEncoder};

/// Errors returned by [`Responder::respond`].
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The handshake has already been answered.
    #[error("the handshake has already been answered")]
    AlreadyResponded,
    /// Writing the response failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Write-side handle used by the authenticator that accepts an agent.
///
/// The handle is consumed by its first use: once a response has been
/// attempted, further calls fail with [`ResponderError::AlreadyResponded`].
#[derive(Debug)]
pub struct Responder<'a> {
    encoder: Option<&'a mut ResponseEncoder>,
    request_id: Option<Value>,
}

impl<'a> Responder<'a> {
    /// Binds a responder to the connection encoder and the handshake id.
    pub fn new(encoder: &'a mut ResponseEncoder, request_id: Option<Value>) -> Self {
        Self {
            encoder: Some(encoder),
            request_id,
        }
    }

    /// Sends the authentication result to the agent.
    ///
    /// # Errors
    ///
    /// Returns [`ResponderError::AlreadyResponded`] on a second call and
    /// [`ResponderError::Encode`] when the write fails.
    pub fn respond<T>(&mut self, result: &T) -> Result<(), ResponderError>
    where
        T: Serialize + ?Sized,
    {
        let encoder = self
            .encoder
            .take()
            .ok_or(ResponderError::AlreadyResponded)?;
        encoder.write_result(self.request_id.as_ref(), result)?;
        Ok(())
    }

    /// Returns `true` once [`Responder::respond`] has been called.
    #[must_use]
    pub fn has_responded(&self) -> bool {
        self.encoder.is_none()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::endpoint::test_utils::SharedBuffer;

    #[test]
    fn responds_once_with_request_id() {
        let buffer = SharedBuffer::default();
        let mut encoder = ResponseEncoder::new(buffer.clone());
        let mut responder = Responder::new(&mut encoder, Some(json!(1)));

        responder
            .respond(&json!({"welcome": true}))
            .expect("first response");
        assert!(responder.has_responded());
        let second = responder.respond(&json!({"welcome": false}));
        assert!(matches!(second, Err(ResponderError::AlreadyResponded)));

        assert_eq!(buffer.values(), vec![json!({"id": 1, "result": {"welcome": true}})]);
    }
}
