//! Authenticator chain run during the handshake.
//!
//! Authenticators are evaluated in ascending priority order (lower numbers
//! first). Each one either accepts the agent and answers through the
//! [`Responder`], declines and stays silent, or fails the handshake outright.
//! The chain never writes to the peer itself: when every authenticator
//! declines, the caller reports [`AuthError::AuthenticationFailed`].

mod responder;
mod static_token;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::chain::{ChainOrder, HandleCode, PriorityChain};
use crate::context::{AgentIdentity, ConnContext};

pub use self::responder::{Responder, ResponderError};
pub use self::static_token::StaticTokenAuthenticator;

const AUTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::auth");

/// Identity and credential an agent presents in `handshake.hello`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Claimed agent name.
    pub agent_name: String,
    /// Claimed agent id.
    pub agent_id: String,
    /// Credential token.
    #[serde(default)]
    pub token: String,
}

impl Credentials {
    /// Builds credentials from their parts.
    pub fn new(
        agent_name: impl Into<String>,
        agent_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_id: agent_id.into(),
            token: token.into(),
        }
    }

    /// The identity these credentials claim.
    #[must_use]
    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity::new(self.agent_name.clone(), self.agent_id.clone())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("agent_name", &self.agent_name)
            .field("agent_id", &self.agent_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Decides whether an agent's claimed identity and credential are acceptable.
///
/// Implementations must call [`Responder::respond`] if and only if they
/// return [`HandleCode::Ok`]. Failures are reported only through the return
/// value; the hub decides how to surface them.
pub trait Authenticator: Send + Sync {
    /// Attempts to authenticate the agent.
    fn authenticate(
        &self,
        credentials: &Credentials,
        responder: &mut Responder<'_>,
        ctx: &ConnContext,
    ) -> HandleCode;
}

impl<T> Authenticator for Arc<T>
where
    T: Authenticator + ?Sized,
{
    fn authenticate(
        &self,
        credentials: &Credentials,
        responder: &mut Responder<'_>,
        ctx: &ConnContext,
    ) -> HandleCode {
        (**self).authenticate(credentials, responder, ctx)
    }
}

/// Why a handshake did not authenticate the agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Every authenticator declined, or none is configured.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// An authenticator failed the handshake; nothing may be sent.
    #[error("authentication rejected by a fatal authenticator error")]
    Rejected,
    /// The handshake params could not be read as credentials.
    #[error("invalid handshake: {message}")]
    InvalidCredentials { message: String },
}

/// Priority-ordered authenticators (ascending: lower numbers run first).
#[derive(Clone)]
pub struct AuthenticatorChain {
    chain: PriorityChain<Arc<dyn Authenticator>>,
}

impl Default for AuthenticatorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthenticatorChain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priorities: Vec<i32> = self.chain.iter().map(|entry| entry.priority()).collect();
        formatter
            .debug_struct("AuthenticatorChain")
            .field("priorities", &priorities)
            .finish()
    }
}

impl AuthenticatorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: PriorityChain::new(ChainOrder::Ascending),
        }
    }

    /// Adds an authenticator; lower priorities run earlier.
    pub fn push<A>(&mut self, authenticator: A, priority: i32)
    where
        A: Authenticator + 'static,
    {
        self.chain.push(Arc::new(authenticator), priority);
    }

    /// Number of authenticators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` when no authenticator is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Runs the chain until an authenticator returns `Ok` or `Fail`.
    ///
    /// Returns [`HandleCode::Declined`] when the chain is empty or every
    /// authenticator declined.
    pub fn iterate(
        &self,
        credentials: &Credentials,
        responder: &mut Responder<'_>,
        ctx: &ConnContext,
    ) -> HandleCode {
        self.chain
            .iterate(HandleCode::Declined, HandleCode::is_definitive, |authenticator| {
                let responded_before = responder.has_responded();
                let code = authenticator.authenticate(credentials, responder, ctx);
                check_responder_discipline(code, responded_before, responder, ctx);
                code
            })
    }

    /// Runs the chain and maps its outcome to a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] when an authenticator failed and
    /// [`AuthError::AuthenticationFailed`] when all of them declined.
    pub fn authenticate(
        &self,
        credentials: &Credentials,
        responder: &mut Responder<'_>,
        ctx: &ConnContext,
    ) -> Result<(), AuthError> {
        match self.iterate(credentials, responder, ctx) {
            HandleCode::Ok => Ok(()),
            HandleCode::Fail => Err(AuthError::Rejected),
            HandleCode::Declined => Err(AuthError::AuthenticationFailed),
        }
    }
}

fn check_responder_discipline(
    code: HandleCode,
    responded_before: bool,
    responder: &Responder<'_>,
    ctx: &ConnContext,
) {
    let responded = responder.has_responded() && !responded_before;
    match (code, responded) {
        (HandleCode::Ok, false) => warn!(
            target: AUTH_TARGET,
            connection = ctx.id(),
            "authenticator returned ok without responding"
        ),
        (HandleCode::Fail | HandleCode::Declined, true) => warn!(
            target: AUTH_TARGET,
            connection = ctx.id(),
            code = ?code,
            "authenticator responded without accepting the agent"
        ),
        _ => {}
    }
}
