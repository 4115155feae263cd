//! Per-connection request loop.

use std::io::Read;

use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::AuthError;
use crate::chain::HandleCode;
use crate::context::ConnContext;
use crate::registry::AgentRegistry;

use super::{
    DISPATCH_TARGET, DispatchError, EncodeError, Endpoint, ErrorCode, HANDSHAKE_METHOD, Request,
    ResponseEncoder,
};

/// Why a serve loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The peer closed the stream between requests.
    EndOfStream,
    /// The stream could not be decoded as JSON; framing is lost.
    DecodeFailed,
    /// A protected method was called before the handshake.
    NotAuthenticated,
    /// The handshake did not authenticate the agent.
    HandshakeFailed(AuthError),
    /// A response could not be written.
    WriteFailed,
}

enum Step {
    Continue,
    Close(ServeOutcome),
}

/// Drives one structured connection: handshake first, then requests in
/// wire order until the stream ends or framing is lost.
pub(crate) struct ServeLoop<'a> {
    endpoint: &'a Endpoint,
    registry: &'a AgentRegistry,
}

impl<'a> ServeLoop<'a> {
    pub(crate) fn new(endpoint: &'a Endpoint, registry: &'a AgentRegistry) -> Self {
        Self { endpoint, registry }
    }

    /// Serves requests decoded from `reader` and releases the connection's
    /// agent from the registry once the loop ends.
    pub(crate) fn run<R>(
        &self,
        reader: R,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> ServeOutcome
    where
        R: Read,
    {
        let outcome = self.serve_requests(reader, encoder, ctx);
        if let Some(agent) = ctx.agent() {
            self.registry.disconnect(&agent.id, ctx.id());
        }
        debug!(
            target: DISPATCH_TARGET,
            connection = ctx.id(),
            outcome = ?outcome,
            "serve loop finished"
        );
        outcome
    }

    fn serve_requests<R>(
        &self,
        reader: R,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> ServeOutcome
    where
        R: Read,
    {
        let values = serde_json::Deserializer::from_reader(reader).into_iter::<Value>();
        for decoded in values {
            let value = match decoded {
                Ok(value) => value,
                Err(error) => {
                    debug!(
                        target: DISPATCH_TARGET,
                        connection = ctx.id(),
                        %error,
                        "failed to decode request"
                    );
                    return ServeOutcome::DecodeFailed;
                }
            };
            match self.serve_one(value, encoder, ctx) {
                Ok(Step::Continue) => {}
                Ok(Step::Close(outcome)) => return outcome,
                Err(error) => {
                    warn!(
                        target: DISPATCH_TARGET,
                        connection = ctx.id(),
                        %error,
                        "failed to write response"
                    );
                    return ServeOutcome::WriteFailed;
                }
            }
        }
        ServeOutcome::EndOfStream
    }

    fn serve_one(
        &self,
        value: Value,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> Result<Step, EncodeError> {
        let id = value.get("id").cloned();
        let request = match Request::from_value(value) {
            Ok(request) => request,
            Err(error) => {
                encoder.write_error(id.as_ref(), ErrorCode::InvalidRequest, &error.to_string())?;
                return Ok(Step::Continue);
            }
        };

        let is_handshake = request.method() == HANDSHAKE_METHOD;
        if !ctx.is_authenticated() && !is_handshake {
            encoder.write_error(
                request.id(),
                ErrorCode::NotAuthenticated,
                "handshake required before calling other methods",
            )?;
            return Ok(Step::Close(ServeOutcome::NotAuthenticated));
        }
        if ctx.is_authenticated() && is_handshake {
            encoder.write_error(
                request.id(),
                ErrorCode::AlreadyAuthenticated,
                "connection is already authenticated",
            )?;
            return Ok(Step::Continue);
        }

        let written_before = encoder.values_written();
        let code = match self
            .endpoint
            .dispatch(request.method(), &request, encoder, ctx)
        {
            Ok(code) => code,
            Err(DispatchError::Encode(error)) => return Err(error),
            Err(error) => {
                let code = error.code().unwrap_or(ErrorCode::InvalidRequest);
                encoder.write_error(request.id(), code, &error.to_string())?;
                return Ok(Step::Continue);
            }
        };

        if is_handshake {
            return finish_handshake(code, &request, encoder, ctx);
        }

        let responded = encoder.values_written() != written_before;
        match (code, responded) {
            (HandleCode::Ok, true) => {}
            (HandleCode::Ok, false) => warn!(
                target: DISPATCH_TARGET,
                connection = ctx.id(),
                method = request.method(),
                "handler returned ok without responding"
            ),
            (HandleCode::Fail | HandleCode::Declined, true) => warn!(
                target: DISPATCH_TARGET,
                connection = ctx.id(),
                method = request.method(),
                "handler responded but did not succeed"
            ),
            (HandleCode::Fail | HandleCode::Declined, false) => {
                let message = format!("method '{}' failed", request.method());
                encoder.write_error(request.id(), ErrorCode::HandlerFailed, &message)?;
            }
        }
        Ok(Step::Continue)
    }
}

/// Decides what the peer sees after `handshake.hello` was dispatched.
///
/// Only the winning authenticator answers a successful handshake; on
/// failure the loop answers unless an authenticator failed fatally.
fn finish_handshake(
    code: HandleCode,
    request: &Request,
    encoder: &mut ResponseEncoder,
    ctx: &ConnContext,
) -> Result<Step, EncodeError> {
    if ctx.is_authenticated() {
        if !code.is_ok() {
            warn!(
                target: DISPATCH_TARGET,
                connection = ctx.id(),
                "handshake authenticated the agent but reported failure"
            );
        }
        return Ok(Step::Continue);
    }

    let failure = ctx
        .handshake_failure()
        .cloned()
        .unwrap_or(AuthError::Rejected);
    match &failure {
        AuthError::AuthenticationFailed => encoder.write_error(
            request.id(),
            ErrorCode::AuthenticationFailed,
            "no authenticator accepted the agent",
        )?,
        AuthError::InvalidCredentials { message } => {
            encoder.write_error(request.id(), ErrorCode::InvalidRequest, message)?;
        }
        AuthError::Rejected => {}
    }
    Ok(Step::Close(ServeOutcome::HandshakeFailed(failure)))
}
