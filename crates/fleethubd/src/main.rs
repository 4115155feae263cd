use std::process::ExitCode;

use fleethub_config::{Config, ConfigError};
use fleethubd::{SystemShutdownSignal, run_daemon};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Arguments(error)) => error.exit(),
        Err(error) => {
            eprintln!("fleethubd: {error}");
            return ExitCode::FAILURE;
        }
    };
    match run_daemon(&config, &SystemShutdownSignal) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fleethubd: {error}");
            ExitCode::FAILURE
        }
    }
}
