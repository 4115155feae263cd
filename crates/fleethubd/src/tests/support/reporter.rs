//! Test double for [`HubReporter`] that records events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::auth::AuthError;
use crate::context::AgentIdentity;
use crate::reporter::HubReporter;

/// Hub events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    ListenerStarted,
    ListenerStopped,
    ConnectionAccepted(u64),
    ProxyPreambleStripped(String),
    UnrecognisedPayload(Vec<u8>),
    AgentAuthenticated(AgentIdentity),
    AuthenticationFailed { agent_id: String, error: AuthError },
    ConnectionClosed(u64),
}

/// Records hub events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHubReporter {
    events: Mutex<Vec<HubEvent>>,
}

impl RecordingHubReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HubEvent> {
        self.events
            .lock()
            .expect("hub reporter mutex poisoned")
            .clone()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&HubEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    /// Polls until an event matching `predicate` is recorded.
    pub fn wait_for(&self, predicate: impl Fn(&HubEvent) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.count(&predicate) > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn record(&self, event: HubEvent) {
        self.events
            .lock()
            .expect("hub reporter mutex poisoned")
            .push(event);
    }
}

impl HubReporter for RecordingHubReporter {
    fn listener_started(&self, _addr: SocketAddr) {
        self.record(HubEvent::ListenerStarted);
    }

    fn listener_stopped(&self, _addr: SocketAddr) {
        self.record(HubEvent::ListenerStopped);
    }

    fn connection_accepted(&self, connection: u64, _peer: SocketAddr) {
        self.record(HubEvent::ConnectionAccepted(connection));
    }

    fn proxy_preamble_stripped(&self, _connection: u64, line: &str) {
        self.record(HubEvent::ProxyPreambleStripped(line.to_owned()));
    }

    fn unrecognised_payload(&self, _connection: u64, prefix: &[u8]) {
        self.record(HubEvent::UnrecognisedPayload(prefix.to_vec()));
    }

    fn agent_authenticated(&self, _connection: u64, identity: &AgentIdentity) {
        self.record(HubEvent::AgentAuthenticated(identity.clone()));
    }

    fn authentication_failed(&self, _connection: u64, agent_id: &str, error: &AuthError) {
        self.record(HubEvent::AuthenticationFailed {
            agent_id: agent_id.to_owned(),
            error: error.clone(),
        });
    }

    fn connection_closed(&self, connection: u64) {
        self.record(HubEvent::ConnectionClosed(connection));
    }
}
