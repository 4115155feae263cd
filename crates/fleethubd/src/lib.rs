//! Fleet hub daemon: the connection server agents report to.
//!
//! Agents open a TCP connection, optionally behind a load balancer that
//! prepends a `PROXY` preamble line, and stream JSON requests. Every
//! connection must authenticate through `handshake.hello` before any other
//! method is dispatched.
//!
//! The crate is built from three pieces:
//!
//! - [`AuthenticatorChain`]: authenticators tried in ascending priority
//!   order. The first to accept or fail decides; if all decline the
//!   handshake fails.
//! - [`Endpoint`]: a flat method table with one [`Handler`] per method name.
//!   [`HandlerChain`] composes several handlers behind one name when needed.
//! - [`Server`]: binds the socket, strips the preamble, sniffs the payload
//!   and drives each structured connection through the serve loop on its
//!   own thread.
//!
//! ```no_run
//! use fleethub_config::Config;
//! use fleethubd::{Server, StaticTokenAuthenticator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = Server::listen(&Config::default())?;
//! server.add_authenticator(StaticTokenAuthenticator::new("secret"), 0)?;
//! server.start()?;
//! // ...
//! server.destroy()?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod chain;
mod context;
mod endpoint;
mod handler;
mod process;
mod registry;
mod reporter;
mod server;
mod telemetry;
mod transport;

pub use auth::{
    AuthError, Authenticator, AuthenticatorChain, Credentials, Responder, ResponderError,
    StaticTokenAuthenticator,
};
pub use chain::{ChainItem, ChainOrder, HandleCode, PriorityChain};
pub use context::{AgentIdentity, ConnContext};
pub use endpoint::{
    BindError, DispatchError, EncodeError, Endpoint, ErrorCode, HANDSHAKE_METHOD, HEARTBEAT_METHOD,
    Request, ResponseEncoder, ServeOutcome,
};
pub use handler::{Handler, HandlerChain};
pub use process::{
    DaemonError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon, run_hub,
};
pub use registry::{AgentRecord, AgentRegistry};
pub use reporter::{HubReporter, StructuredHubReporter};
pub use server::{Server, ServerState};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
