use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use once_cell::sync::Lazy;
use rstest::rstest;

use fleethub_config::{Config, ConfigError, LogFormat, SocketEndpoint, default_socket_endpoint};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024; the mutex keeps
        // tests in this binary from racing on it.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().expect("env mutex poisoned")
}

#[test]
fn defaults_apply_without_flags() {
    let _guard = env_lock();
    let config = Config::load_from_iter(["fleethubd"]).expect("load defaults");
    assert_eq!(config.listen(), &default_socket_endpoint());
    assert_eq!(config.log_filter(), "info");
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.read_timeout(), None);
    assert_eq!(config.auth_token(), None);
}

#[test]
fn flags_override_defaults() {
    let _guard = env_lock();
    let config = Config::load_from_iter([
        "fleethubd",
        "--listen",
        "tcp://0.0.0.0:9100",
        "--log-format",
        "compact",
        "--read-timeout-ms",
        "2500",
        "--auth-token",
        "s3cret",
    ])
    .expect("load flags");
    assert_eq!(config.listen(), &SocketEndpoint::tcp("0.0.0.0", 9100));
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(config.read_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(config.auth_token(), Some("s3cret"));
}

#[test]
fn environment_supplies_values_and_flags_win() {
    let _override = EnvOverride::set_var("FLEETHUB_LOG_FILTER", OsStr::new("fleethubd=debug"));
    let from_env = Config::load_from_iter(["fleethubd"]).expect("load env");
    assert_eq!(from_env.log_filter(), "fleethubd=debug");

    let from_flag = Config::load_from_iter(["fleethubd", "--log-filter", "warn"])
        .expect("load flag over env");
    assert_eq!(from_flag.log_filter(), "warn");
}

#[rstest]
#[case::read("--read-timeout-ms")]
#[case::write("--write-timeout-ms")]
fn zero_timeouts_are_rejected(#[case] flag: &str) {
    let _guard = env_lock();
    let error = Config::load_from_iter(["fleethubd", flag, "0"]).expect_err("zero timeout");
    assert!(matches!(error, ConfigError::ZeroTimeout { .. }));
}

#[test]
fn blank_token_is_rejected() {
    let _guard = env_lock();
    let error =
        Config::load_from_iter(["fleethubd", "--auth-token", "  "]).expect_err("blank token");
    assert!(matches!(error, ConfigError::EmptyToken));
}

#[test]
fn malformed_listen_address_is_an_argument_error() {
    let _guard = env_lock();
    let error = Config::load_from_iter(["fleethubd", "--listen", "unix:///tmp/hub.sock"])
        .expect_err("unsupported scheme");
    assert!(matches!(error, ConfigError::Arguments(_)));
}

#[test]
fn zero_timeouts_built_directly_mean_no_timeout() {
    let config = Config {
        read_timeout_ms: Some(0),
        write_timeout_ms: Some(0),
        ..Config::default()
    };

    assert_eq!(config.read_timeout(), None);
    assert_eq!(config.write_timeout(), None);
}
