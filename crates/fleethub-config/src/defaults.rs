use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port the hub listens on.
pub const DEFAULT_TCP_PORT: u16 = 7946;

/// Default host the hub binds to.
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default listening endpoint for the hub.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_TCP_HOST, DEFAULT_TCP_PORT)
}
