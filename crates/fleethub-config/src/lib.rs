//! Shared configuration for the fleet hub daemon.
//!
//! Configuration is resolved from command-line flags and `FLEETHUB_*`
//! environment variables through [`ConfigArgs`], then validated into a
//! [`Config`]. The [`Config`] type is also serde-compatible so embedders can
//! deserialize it from their own configuration files.

mod args;
mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use args::{ConfigArgs, ConfigError};
pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT, default_log_filter,
    default_log_filter_string, default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError};

/// Resolved hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Socket the hub listens on.
    pub listen: SocketEndpoint,
    /// `tracing` filter expression, e.g. `info` or `fleethubd=debug`.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Per-connection read timeout in milliseconds; `None` blocks forever.
    pub read_timeout_ms: Option<u64>,
    /// Per-connection write timeout in milliseconds; `None` blocks forever.
    pub write_timeout_ms: Option<u64>,
    /// Shared token accepted by the static token authenticator.
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            read_timeout_ms: None,
            write_timeout_ms: None,
            auth_token: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments fail to parse or validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the binary name, mirroring
    /// [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the arguments fail to parse or validate.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        ConfigArgs::parse_from_iter(args)?.into_config()
    }

    /// Listening socket.
    #[must_use]
    pub fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Read timeout applied to accepted connections. Zero means
    /// no timeout, as sockets reject a zero duration.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }

    /// Write timeout applied to accepted connections. Zero means
    /// no timeout, as sockets reject a zero duration.
    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.write_timeout_ms)
    }

    /// Shared authentication token, when configured.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

fn non_zero_millis(millis: Option<u64>) -> Option<Duration> {
    millis.filter(|millis| *millis > 0).map(Duration::from_millis)
}
