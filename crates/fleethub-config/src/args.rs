//! Command-line and environment layer for the hub configuration.

use std::ffi::OsString;

use clap::Parser;
use thiserror::Error;

use crate::{Config, DEFAULT_LOG_FILTER, LogFormat, SocketEndpoint, default_socket_endpoint};

/// Flags accepted by `fleethubd`.
///
/// Every flag can also be supplied through the matching `FLEETHUB_*`
/// environment variable; explicit flags take precedence.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleethubd", version, about = "Agent fleet connection hub")]
pub struct ConfigArgs {
    /// Socket to listen on, e.g. `tcp://0.0.0.0:7946`.
    #[arg(long, env = "FLEETHUB_LISTEN", default_value_t = default_socket_endpoint())]
    pub listen: SocketEndpoint,
    /// `tracing` filter expression.
    #[arg(long, env = "FLEETHUB_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
    /// Log output format (`json` or `compact`).
    #[arg(long, env = "FLEETHUB_LOG_FORMAT", default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
    /// Per-connection read timeout in milliseconds.
    #[arg(long, env = "FLEETHUB_READ_TIMEOUT_MS")]
    pub read_timeout_ms: Option<u64>,
    /// Per-connection write timeout in milliseconds.
    #[arg(long, env = "FLEETHUB_WRITE_TIMEOUT_MS")]
    pub write_timeout_ms: Option<u64>,
    /// Shared token accepted from agents during the handshake.
    #[arg(long, env = "FLEETHUB_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Flags or environment variables failed to parse.
    #[error("invalid arguments: {0}")]
    Arguments(#[from] clap::Error),
    /// A timeout of zero was supplied; the socket API rejects it.
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
    /// The shared token was supplied but empty.
    #[error("auth token must not be empty")]
    EmptyToken,
}

impl ConfigArgs {
    /// Parses flags from an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Arguments`] when parsing fails.
    pub fn parse_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::try_parse_from(args)?)
    }

    /// Validates the parsed flags and converts them into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a timeout is zero or the token is empty.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.read_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout {
                field: "read_timeout_ms",
            });
        }
        if self.write_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout {
                field: "write_timeout_ms",
            });
        }
        if self
            .auth_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(ConfigError::EmptyToken);
        }

        Ok(Config {
            listen: self.listen,
            log_filter: self.log_filter,
            log_format: self.log_format,
            read_timeout_ms: self.read_timeout_ms,
            write_timeout_ms: self.write_timeout_ms,
            auth_token: self.auth_token,
        })
    }
}
