//! Handlers pre-registered on every server.

use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::{debug, warn};

use crate::auth::{AuthError, AuthenticatorChain, Credentials, Responder};
use crate::chain::HandleCode;
use crate::context::ConnContext;
use crate::handler::Handler;
use crate::registry::AgentRegistry;
use crate::reporter::HubReporter;

use super::{DISPATCH_TARGET, Request, ResponseEncoder};

/// Runs the authenticator chain for `handshake.hello`.
///
/// The handler never writes a failure itself: it records the reason on the
/// connection context and lets the serve loop decide whether to answer.
pub(crate) struct HandshakeHandler {
    authenticators: Arc<RwLock<AuthenticatorChain>>,
    registry: AgentRegistry,
    reporter: Arc<dyn HubReporter>,
}

impl HandshakeHandler {
    pub(crate) fn new(
        authenticators: Arc<RwLock<AuthenticatorChain>>,
        registry: AgentRegistry,
        reporter: Arc<dyn HubReporter>,
    ) -> Self {
        Self {
            authenticators,
            registry,
            reporter,
        }
    }
}

impl Handler for HandshakeHandler {
    fn handle(
        &self,
        request: &Request,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> HandleCode {
        let credentials = match request.parse_params::<Credentials>() {
            Ok(credentials) => credentials,
            Err(error) => {
                debug!(target: DISPATCH_TARGET, connection = ctx.id(), %error, "malformed handshake");
                ctx.record_handshake_failure(AuthError::InvalidCredentials {
                    message: error.to_string(),
                });
                return HandleCode::Fail;
            }
        };

        let outcome = {
            let chain = self
                .authenticators
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut responder = Responder::new(encoder, request.id().cloned());
            chain.authenticate(&credentials, &mut responder, ctx)
        };

        match outcome {
            Ok(()) => {
                let identity = credentials.identity();
                if let Some(previous) = self.registry.register(identity.clone(), ctx.id()) {
                    debug!(
                        target: DISPATCH_TARGET,
                        agent = %identity,
                        previous_connection = previous.connection,
                        "agent re-registered from a new connection"
                    );
                }
                self.reporter.agent_authenticated(ctx.id(), &identity);
                ctx.mark_authenticated(identity);
                HandleCode::Ok
            }
            Err(error) => {
                self.reporter
                    .authentication_failed(ctx.id(), &credentials.agent_id, &error);
                ctx.record_handshake_failure(error);
                HandleCode::Fail
            }
        }
    }
}

/// Records `heartbeat.post` calls against the connection's agent.
pub(crate) struct HeartbeatHandler {
    registry: AgentRegistry,
}

impl HeartbeatHandler {
    pub(crate) fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }
}

impl Handler for HeartbeatHandler {
    fn handle(
        &self,
        request: &Request,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> HandleCode {
        let Some(agent) = ctx.agent() else {
            return HandleCode::Fail;
        };
        if !self.registry.touch(&agent.id, request.params().clone()) {
            warn!(
                target: DISPATCH_TARGET,
                agent = %agent,
                "heartbeat from agent missing in registry"
            );
            return HandleCode::Fail;
        }
        match encoder.write_result(request.id(), &json!({"acknowledged": true})) {
            Ok(()) => HandleCode::Ok,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to acknowledge heartbeat");
                HandleCode::Fail
            }
        }
    }
}
