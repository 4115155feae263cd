//! Per-connection context shared with authenticators and handlers.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Identity an agent declared during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Human-readable agent name.
    pub name: String,
    /// Stable agent identifier; the registry key.
    pub id: String,
}

impl AgentIdentity {
    /// Builds an identity from its parts.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.name, self.id)
    }
}

/// State carried for the lifetime of one accepted connection.
///
/// A context is created once per connection and handed unchanged to every
/// authenticator and handler invocation on that connection.
#[derive(Debug)]
pub struct ConnContext {
    id: u64,
    peer: Option<SocketAddr>,
    proxy_preamble: Option<String>,
    agent: Option<AgentIdentity>,
    handshake_failure: Option<AuthError>,
}

impl ConnContext {
    /// Creates the context for a freshly accepted connection.
    #[must_use]
    pub fn new(id: u64, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            proxy_preamble: None,
            agent: None,
            handshake_failure: None,
        }
    }

    /// Server-unique connection number.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Socket address of the directly connected peer.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Raw proxy preamble line stripped from the stream, without the newline.
    #[must_use]
    pub fn proxy_preamble(&self) -> Option<&str> {
        self.proxy_preamble.as_deref()
    }

    pub(crate) fn set_proxy_preamble(&mut self, line: String) {
        self.proxy_preamble = Some(line);
    }

    /// Agent authenticated on this connection, if any.
    #[must_use]
    pub fn agent(&self) -> Option<&AgentIdentity> {
        self.agent.as_ref()
    }

    /// Returns `true` once an authenticator accepted the agent.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.agent.is_some()
    }

    /// Records the authenticated identity. Only the first call takes effect.
    pub(crate) fn mark_authenticated(&mut self, identity: AgentIdentity) {
        if self.agent.is_none() {
            self.agent = Some(identity);
            self.handshake_failure = None;
        }
    }

    /// Why the last handshake on this connection failed, if it did.
    #[must_use]
    pub fn handshake_failure(&self) -> Option<&AuthError> {
        self.handshake_failure.as_ref()
    }

    pub(crate) fn record_handshake_failure(&mut self, error: AuthError) {
        self.handshake_failure = Some(error);
    }
}
