//! Environment variable loading and management.
//!
//! Recognised variables:
//! - `ENSEMBLE_MAX_WORKERS` - parallel worker bound
//! - `ENSEMBLE_TIMEOUT_SECONDS` - parallel batch timeout
//! - `ENSEMBLE_LOG_LEVEL` - run log level

use std::env;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Environment variable for the parallel worker bound
pub const MAX_WORKERS_VAR: &str = "ENSEMBLE_MAX_WORKERS";
/// Environment variable for the parallel batch timeout, in seconds
pub const TIMEOUT_SECONDS_VAR: &str = "ENSEMBLE_TIMEOUT_SECONDS";
/// Environment variable for the log level
pub const LOG_LEVEL_VAR: &str = "ENSEMBLE_LOG_LEVEL";

/// Values read from `ENSEMBLE_*` variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `ENSEMBLE_MAX_WORKERS`
    pub max_workers: Option<usize>,
    /// `ENSEMBLE_TIMEOUT_SECONDS`
    pub timeout_seconds: Option<u64>,
    /// `ENSEMBLE_LOG_LEVEL`
    pub log_level: Option<String>,
}

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to a .env file. Nothing is loaded when None.
    pub fn new(env_file: Option<&Path>) -> Self {
        if let Some(path) = env_file.filter(|p| p.exists()) {
            if let Err(e) = dotenv::from_path(path) {
                warn!(path = %path.display(), error = %e, "failed to load .env file");
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The .env file this loader was created with.
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Parallel worker bound, if set and valid.
    pub fn max_workers(&self) -> Option<usize> {
        parse_var(MAX_WORKERS_VAR)
    }

    /// Batch timeout in seconds, if set and valid.
    pub fn timeout_seconds(&self) -> Option<u64> {
        parse_var(TIMEOUT_SECONDS_VAR)
    }

    /// Log level, if set and non-empty.
    pub fn log_level(&self) -> Option<String> {
        env::var(LOG_LEVEL_VAR).ok().filter(|v| !v.trim().is_empty())
    }

    /// Every recognised override at once.
    pub fn overrides(&self) -> EnvOverrides {
        EnvOverrides {
            max_workers: self.max_workers(),
            timeout_seconds: self.timeout_seconds(),
            log_level: self.log_level(),
        }
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
