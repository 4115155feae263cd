//! Foreground hub process: telemetry, server lifecycle and shutdown signals.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use fleethub_config::Config;

use crate::auth::StaticTokenAuthenticator;
use crate::server::Server;
use crate::telemetry::{self, TelemetryError};
use crate::transport::ListenerError;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Priority of the static token authenticator installed by the binary.
const STATIC_TOKEN_PRIORITY: i32 = 100;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}

/// Errors surfaced while running the hub process.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The listener failed to bind, start or stop.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// Waiting for the shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Installs telemetry, then runs the hub until `shutdown` fires.
///
/// # Errors
///
/// Returns [`DaemonError`] when telemetry, the listener or the signal
/// listener fail.
pub fn run_daemon(config: &Config, shutdown: &dyn ShutdownSignal) -> Result<(), DaemonError> {
    telemetry::initialise(config)?;
    run_hub(config, shutdown)
}

/// Binds and starts the hub, waits for `shutdown`, then destroys the server.
///
/// # Errors
///
/// Returns [`DaemonError`] when the listener or the signal listener fail.
/// The server is destroyed on every path once bound.
pub fn run_hub(config: &Config, shutdown: &dyn ShutdownSignal) -> Result<(), DaemonError> {
    let mut server = Server::listen(config)?;
    install_authenticators(&mut server, config);
    server.start()?;
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.listen(),
        addr = %server.local_addr(),
        "fleet hub ready"
    );

    let waited = shutdown.wait();
    server.destroy()?;
    info!(target: PROCESS_TARGET, "fleet hub stopped");
    waited.map_err(DaemonError::from)
}

fn install_authenticators(server: &mut Server, config: &Config) {
    let Some(token) = config.auth_token() else {
        warn!(
            target: PROCESS_TARGET,
            "no auth token configured; every handshake will fail"
        );
        return;
    };
    let authenticator = StaticTokenAuthenticator::new(token);
    if let Err(error) = server.add_authenticator(authenticator, STATIC_TOKEN_PRIORITY) {
        warn!(target: PROCESS_TARGET, %error, "failed to install token authenticator");
    }
}
