//! Connection server and its start/destroy lifecycle.
//!
//! A [`Server`] binds its TCP socket at construction and pre-registers the
//! built-in `handshake.hello` and `heartbeat.post` methods. Methods and
//! authenticators may be added until [`Server::start`] freezes the method
//! table and spawns the accept loop. [`Server::destroy`] stops accepting,
//! closes the socket and waits for every in-flight connection to finish.

mod connection;

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use fleethub_config::Config;

use crate::auth::{Authenticator, AuthenticatorChain};
use crate::endpoint::{
    BindError, Endpoint, HANDSHAKE_METHOD, HEARTBEAT_METHOD, HandshakeHandler, HeartbeatHandler,
};
use crate::handler::Handler;
use crate::registry::AgentRegistry;
use crate::reporter::{HubReporter, StructuredHubReporter};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

use self::connection::{ConnectionTimeouts, HubConnectionHandler};

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Bound but not accepting; methods may still be bound.
    Created,
    /// The accept loop is running.
    Running,
    /// Destroy is waiting for in-flight connections.
    Stopping,
    /// Terminal state.
    Stopped,
}

/// The hub's connection server.
pub struct Server {
    endpoint: Arc<Endpoint>,
    authenticators: Arc<RwLock<AuthenticatorChain>>,
    registry: AgentRegistry,
    reporter: Arc<dyn HubReporter>,
    timeouts: ConnectionTimeouts,
    local_addr: SocketAddr,
    listener: Option<SocketListener>,
    handle: Option<ListenerHandle>,
    state: ServerState,
}

impl fmt::Debug for Server {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state)
            .field("methods", &self.endpoint.methods())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Binds the configured socket with the default structured reporter.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address cannot be resolved or bound.
    pub fn listen(config: &Config) -> Result<Self, ListenerError> {
        Self::listen_with_reporter(config, Arc::new(StructuredHubReporter::new()))
    }

    /// Binds the configured socket, reporting events to `reporter`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address cannot be resolved or bound.
    pub fn listen_with_reporter(
        config: &Config,
        reporter: Arc<dyn HubReporter>,
    ) -> Result<Self, ListenerError> {
        let listener = SocketListener::bind(config.listen())?;
        let local_addr = listener.local_addr();
        let authenticators = Arc::new(RwLock::new(AuthenticatorChain::new()));
        let registry = AgentRegistry::new();
        let endpoint = builtin_endpoint(&authenticators, &registry, &reporter);
        Ok(Self {
            endpoint: Arc::new(endpoint),
            authenticators,
            registry,
            reporter,
            timeouts: ConnectionTimeouts {
                read: config.read_timeout(),
                write: config.write_timeout(),
            },
            local_addr,
            listener: Some(listener),
            handle: None,
            state: ServerState::Created,
        })
    }

    /// Address the server is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Registry of agents authenticated on live connections.
    #[must_use]
    pub fn agents(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Sorted names of the bound methods, built-ins included.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        self.endpoint.methods()
    }

    /// Binds `handler` to `method`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::AlreadyStarted`] once [`Server::start`] has run,
    /// and [`BindError::DuplicateMethod`] when the name is taken.
    pub fn bind<H>(&mut self, method: impl Into<String>, handler: H) -> Result<(), BindError>
    where
        H: Handler + 'static,
    {
        self.ensure_unstarted()?;
        let endpoint = Arc::get_mut(&mut self.endpoint).ok_or(BindError::AlreadyStarted)?;
        endpoint.bind(method, handler)
    }

    /// Adds an authenticator to the handshake chain; lower priorities run
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::AlreadyStarted`] once [`Server::start`] has run.
    pub fn add_authenticator<A>(&mut self, authenticator: A, priority: i32) -> Result<(), BindError>
    where
        A: Authenticator + 'static,
    {
        self.ensure_unstarted()?;
        self.authenticators
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(authenticator, priority);
        Ok(())
    }

    fn ensure_unstarted(&self) -> Result<(), BindError> {
        match self.state {
            ServerState::Created => Ok(()),
            _ => Err(BindError::AlreadyStarted),
        }
    }

    /// Spawns the accept loop. Calling it again, or after destroy, does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket cannot be
    /// switched to non-blocking mode; the server stays startable. A failure
    /// to spawn the accept thread releases the socket and stops the server.
    pub fn start(&mut self) -> Result<(), ListenerError> {
        if self.state != ServerState::Created {
            return Ok(());
        }
        let Some(listener) = self.listener.as_ref() else {
            return Ok(());
        };
        listener.prepare()?;
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        let handler = HubConnectionHandler::new(
            Arc::clone(&self.endpoint),
            self.registry.clone(),
            Arc::clone(&self.reporter),
            self.timeouts,
        );
        let handle = match listener.start(Arc::new(handler)) {
            Ok(handle) => handle,
            Err(error) => {
                // The socket went down with the failed accept thread.
                self.state = ServerState::Stopped;
                return Err(error);
            }
        };
        self.handle = Some(handle);
        self.state = ServerState::Running;
        info!(
            target: SERVER_TARGET,
            addr = %self.local_addr,
            methods = ?self.endpoint.methods(),
            "server started"
        );
        self.reporter.listener_started(self.local_addr);
        Ok(())
    }

    /// Stops accepting, closes the socket and blocks until every in-flight
    /// connection has finished. Later calls return immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the accept thread panicked.
    pub fn destroy(&mut self) -> Result<(), ListenerError> {
        if self.state == ServerState::Stopped {
            return Ok(());
        }
        self.state = ServerState::Stopping;
        self.listener = None;
        let result = match self.handle.take() {
            Some(handle) => {
                handle.shutdown();
                let joined = handle.join();
                self.reporter.listener_stopped(self.local_addr);
                joined
            }
            None => Ok(()),
        };
        self.state = ServerState::Stopped;
        result
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            warn!(target: SERVER_TARGET, %error, "server shutdown failed");
        }
    }
}

fn builtin_endpoint(
    authenticators: &Arc<RwLock<AuthenticatorChain>>,
    registry: &AgentRegistry,
    reporter: &Arc<dyn HubReporter>,
) -> Endpoint {
    let mut endpoint = Endpoint::new();
    let handshake = HandshakeHandler::new(
        Arc::clone(authenticators),
        registry.clone(),
        Arc::clone(reporter),
    );
    let heartbeat = HeartbeatHandler::new(registry.clone());
    for registered in [
        endpoint.bind(HANDSHAKE_METHOD, handshake),
        endpoint.bind(HEARTBEAT_METHOD, heartbeat),
    ] {
        if let Err(error) = registered {
            warn!(target: SERVER_TARGET, %error, "built-in method was not registered");
        }
    }
    endpoint
}
