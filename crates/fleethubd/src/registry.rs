//! Registry of agents authenticated on live connections.
//!
//! The registry encapsulates the `Arc<Mutex<...>>` locking pattern so that
//! connection threads can register and look up agents concurrently without
//! touching the lock directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use serde_json::Value;
use tracing::warn;

use crate::context::AgentIdentity;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// State tracked for one connected agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    /// Identity presented during the handshake.
    pub identity: AgentIdentity,
    /// Connection currently owning the agent.
    pub connection: u64,
    /// When the agent authenticated.
    pub connected_at: SystemTime,
    /// When the agent last posted a heartbeat.
    pub last_heartbeat: Option<SystemTime>,
    /// Parameters of the most recent heartbeat.
    pub last_status: Value,
}

/// Shared, cloneable handle to the agent registry.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    inner: Arc<Mutex<HashMap<String, AgentRecord>>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AgentRecord>> {
        // A panicking handler must not take the whole registry down with it.
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!(target: REGISTRY_TARGET, "agent registry lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Records an agent as owned by `connection`.
    ///
    /// Returns the record it replaced, which happens when the same agent id
    /// reconnects before its previous connection closed.
    pub fn register(&self, identity: AgentIdentity, connection: u64) -> Option<AgentRecord> {
        let record = AgentRecord {
            identity: identity.clone(),
            connection,
            connected_at: SystemTime::now(),
            last_heartbeat: None,
            last_status: Value::Null,
        };
        self.lock().insert(identity.id, record)
    }

    /// Records a heartbeat for `agent_id`. Returns `false` for unknown agents.
    pub fn touch(&self, agent_id: &str, status: Value) -> bool {
        match self.lock().get_mut(agent_id) {
            Some(record) => {
                record.last_heartbeat = Some(SystemTime::now());
                record.last_status = status;
                true
            }
            None => false,
        }
    }

    /// Removes `agent_id` if it is still owned by `connection`.
    ///
    /// A newer connection that re-registered the same agent keeps its record.
    pub fn disconnect(&self, agent_id: &str, connection: u64) -> Option<AgentRecord> {
        let mut agents = self.lock();
        if agents
            .get(agent_id)
            .is_some_and(|record| record.connection == connection)
        {
            agents.remove(agent_id)
        } else {
            None
        }
    }

    /// Snapshot of a single agent's record.
    #[must_use]
    pub fn get(&self, agent_id: &str) -> Option<AgentRecord> {
        self.lock().get(agent_id).cloned()
    }

    /// Sorted ids of all registered agents.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
