//! Structured reporting for hub lifecycle and connection events.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::AuthError;
use crate::context::AgentIdentity;

/// Observer trait used to surface hub events to telemetry sinks.
pub trait HubReporter: Send + Sync {
    /// Invoked once the accept loop is running.
    fn listener_started(&self, addr: SocketAddr);

    /// Invoked after the accept loop exited and every connection finished.
    fn listener_stopped(&self, addr: SocketAddr);

    /// Invoked when a connection is accepted.
    fn connection_accepted(&self, connection: u64, peer: SocketAddr);

    /// Invoked when a proxy preamble line was stripped from a connection.
    fn proxy_preamble_stripped(&self, connection: u64, line: &str);

    /// Invoked when a connection does not start with a JSON object.
    fn unrecognised_payload(&self, connection: u64, prefix: &[u8]);

    /// Invoked when the authenticator chain accepted an agent.
    fn agent_authenticated(&self, connection: u64, identity: &AgentIdentity);

    /// Invoked when a handshake did not authenticate the agent.
    fn authentication_failed(&self, connection: u64, agent_id: &str, error: &AuthError);

    /// Invoked when a connection has been closed.
    fn connection_closed(&self, connection: u64);
}

impl<T> HubReporter for Arc<T>
where
    T: HubReporter + ?Sized,
{
    fn listener_started(&self, addr: SocketAddr) {
        (**self).listener_started(addr);
    }

    fn listener_stopped(&self, addr: SocketAddr) {
        (**self).listener_stopped(addr);
    }

    fn connection_accepted(&self, connection: u64, peer: SocketAddr) {
        (**self).connection_accepted(connection, peer);
    }

    fn proxy_preamble_stripped(&self, connection: u64, line: &str) {
        (**self).proxy_preamble_stripped(connection, line);
    }

    fn unrecognised_payload(&self, connection: u64, prefix: &[u8]) {
        (**self).unrecognised_payload(connection, prefix);
    }

    fn agent_authenticated(&self, connection: u64, identity: &AgentIdentity) {
        (**self).agent_authenticated(connection, identity);
    }

    fn authentication_failed(&self, connection: u64, agent_id: &str, error: &AuthError) {
        (**self).authentication_failed(connection, agent_id, error);
    }

    fn connection_closed(&self, connection: u64) {
        (**self).connection_closed(connection);
    }
}

/// Default reporter that records events using `tracing`.
///
/// Without an installed subscriber every event is discarded, so embedding
/// the hub does not force a logging setup on the host process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHubReporter;

impl StructuredHubReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HubReporter for StructuredHubReporter {
    fn listener_started(&self, addr: SocketAddr) {
        tracing::info!(
            target: "fleethubd::hub",
            event = "listener_started",
            %addr,
            "hub accepting connections"
        );
    }

    fn listener_stopped(&self, addr: SocketAddr) {
        tracing::info!(
            target: "fleethubd::hub",
            event = "listener_stopped",
            %addr,
            "hub stopped"
        );
    }

    fn connection_accepted(&self, connection: u64, peer: SocketAddr) {
        tracing::debug!(
            target: "fleethubd::hub",
            event = "connection_accepted",
            connection,
            %peer,
            "connection accepted"
        );
    }

    fn proxy_preamble_stripped(&self, connection: u64, line: &str) {
        tracing::debug!(
            target: "fleethubd::hub",
            event = "proxy_preamble_stripped",
            connection,
            preamble = line,
            "proxy preamble stripped"
        );
    }

    fn unrecognised_payload(&self, connection: u64, prefix: &[u8]) {
        tracing::info!(
            target: "fleethubd::hub",
            event = "unrecognised_payload",
            connection,
            prefix = %String::from_utf8_lossy(prefix),
            "closing connection with unrecognised payload"
        );
    }

    fn agent_authenticated(&self, connection: u64, identity: &AgentIdentity) {
        tracing::info!(
            target: "fleethubd::hub",
            event = "agent_authenticated",
            connection,
            agent = %identity,
            "agent authenticated"
        );
    }

    fn authentication_failed(&self, connection: u64, agent_id: &str, error: &AuthError) {
        tracing::warn!(
            target: "fleethubd::hub",
            event = "authentication_failed",
            connection,
            agent_id,
            %error,
            "agent authentication failed"
        );
    }

    fn connection_closed(&self, connection: u64) {
        tracing::debug!(
            target: "fleethubd::hub",
            event = "connection_closed",
            connection,
            "connection closed"
        );
    }
}
