//! TOML configuration parsing and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::environment::{EnvOverrides, EnvironmentLoader};
use crate::orchestration::memory::{MemoryConfig, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_RESULTS};
use crate::orchestration::parallel::{default_workers, ParallelConfig};
use crate::orchestration::{AgentChain, ChainStep, SharedMemory, WorkflowOrchestrator};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    /// `[memory]` section
    pub memory: MemorySection,
    #[serde(default)]
    /// `[parallel]` section
    pub parallel: ParallelSection,
    #[serde(default)]
    /// `[chain]` section
    pub chain: ChainSection,
    #[serde(default)]
    /// `[logging]` section
    pub logging: LoggingConfig,
}

/// Shared memory capacities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_max_messages")]
    /// Message log cap
    pub max_messages: usize,
    #[serde(default = "default_max_results")]
    /// Result store cap
    pub max_results: usize,
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Parallel executor settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParallelSection {
    /// Worker bound. Defaults to the available parallelism.
    pub max_workers: Option<usize>,
    /// Batch timeout. No timeout when unset.
    pub timeout_seconds: Option<u64>,
}

/// Chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSection {
    #[serde(default = "default_stop_on_error")]
    /// Whether a failed step ends a chain
    pub stop_on_error: bool,
}

fn default_stop_on_error() -> bool {
    true
}

impl Default for ChainSection {
    fn default() -> Self {
        Self { stop_on_error: true }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Markdown run log path. No run log when unset.
    pub log_file: Option<String>,
    #[serde(default = "default_log_level")]
    /// Run log level
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    /// Path the configuration was read from
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: EnsembleConfig,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None or missing, uses defaults.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/ensemble.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            EnsembleConfig::default()
        };

        Ok(Self { config_path, config })
    }

    /// Create a configuration loader from an already parsed configuration.
    pub fn from_config(config: EnsembleConfig) -> Self {
        Self {
            config_path: PathBuf::from("config/ensemble.toml"),
            config,
        }
    }

    fn load_config(path: &Path) -> Result<EnsembleConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Apply `ENSEMBLE_*` overrides from the environment.
    pub fn apply_env(&mut self, env: &EnvironmentLoader) {
        self.apply_overrides(env.overrides());
    }

    /// Apply explicit overrides. Unset fields leave the file values alone.
    pub fn apply_overrides(&mut self, overrides: EnvOverrides) {
        if let Some(max_workers) = overrides.max_workers {
            self.config.parallel.max_workers = Some(max_workers);
        }
        if let Some(timeout) = overrides.timeout_seconds {
            self.config.parallel.timeout_seconds = Some(timeout);
        }
        if let Some(level) = overrides.log_level {
            self.config.logging.log_level = level;
        }
    }

    /// Shared memory capacities, clamped to at least one.
    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig::new(self.config.memory.max_messages, self.config.memory.max_results)
    }

    /// Parallel executor settings.
    pub fn parallel_config(&self) -> ParallelConfig {
        ParallelConfig {
            max_workers: self.config.parallel.max_workers.unwrap_or_else(default_workers),
            timeout: self.config.parallel.timeout_seconds.map(Duration::from_secs),
        }
    }

    /// Shared memory sized from this configuration.
    pub fn shared_memory(&self) -> SharedMemory {
        SharedMemory::with_config(self.memory_config())
    }

    /// Chain on `memory` honoring `[chain] stop_on_error`.
    pub fn chain(&self, steps: Vec<ChainStep>, memory: SharedMemory) -> AgentChain {
        AgentChain::with_memory(steps, memory).stop_on_error(self.config.chain.stop_on_error)
    }

    /// Empty orchestrator with memory and parallelism from this configuration.
    pub fn orchestrator(&self) -> WorkflowOrchestrator {
        WorkflowOrchestrator::with_memory(self.shared_memory(), self.parallel_config())
    }

    /// Run logger for `[logging]`, when a log file is configured.
    #[cfg(feature = "observability")]
    pub fn run_logger(&self) -> Result<Option<crate::observability::RunLogger>> {
        self.config
            .logging
            .log_file
            .as_deref()
            .map(|path| crate::observability::RunLogger::new(Some(Path::new(path)), Some(&self.config.logging.log_level)))
            .transpose()
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "logging.log_file" => self.config.logging.log_file.clone(),
            "logging.log_level" => Some(self.config.logging.log_level.clone()),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match key {
            "memory.max_messages" => Some(self.config.memory.max_messages as u64),
            "memory.max_results" => Some(self.config.memory.max_results as u64),
            "parallel.max_workers" => self.config.parallel.max_workers.map(|n| n as u64),
            "parallel.timeout_seconds" => self.config.parallel.timeout_seconds,
            _ => None,
        }
    }

    /// Get boolean configuration value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            "chain.stop_on_error" => Some(self.config.chain.stop_on_error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let loader = ConfigurationLoader::new(Some(Path::new("/nonexistent/ensemble.toml"))).unwrap();
        let config = &loader.config;
        assert_eq!(config.memory.max_messages, 1000);
        assert_eq!(config.memory.max_results, 100);
        assert!(config.parallel.max_workers.is_none());
        assert!(config.chain.stop_on_error);
        assert_eq!(config.logging.log_level, "INFO");

        let parallel = loader.parallel_config();
        assert!(parallel.max_workers >= 1);
        assert!(parallel.timeout.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[memory]
max_results = 5

[parallel]
max_workers = 3
timeout_seconds = 30

[chain]
stop_on_error = false
"#
        )
        .unwrap();

        let loader = ConfigurationLoader::new(Some(file.path())).unwrap();
        assert_eq!(loader.get_u64("memory.max_messages"), Some(1000));
        assert_eq!(loader.get_u64("memory.max_results"), Some(5));
        assert_eq!(loader.get_bool("chain.stop_on_error"), Some(false));
        assert_eq!(loader.get_string("logging.log_file"), None);

        let parallel = loader.parallel_config();
        assert_eq!(parallel.max_workers, 3);
        assert_eq!(parallel.timeout, Some(Duration::from_secs(30)));

        let chain = loader.chain(Vec::new(), loader.shared_memory());
        assert!(!chain.stops_on_error());
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[memory\nmax_results = ").unwrap();

        let err = ConfigurationLoader::new(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_zero_capacities_are_clamped() {
        let mut config = EnsembleConfig::default();
        config.memory.max_messages = 0;
        config.parallel.max_workers = Some(0);
        let loader = ConfigurationLoader::from_config(config);

        let memory = loader.memory_config();
        assert_eq!(memory.max_messages, 1);
        assert_eq!(loader.orchestrator().workflow_summary().steps.len(), 0);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut loader = ConfigurationLoader::from_config(EnsembleConfig::default());
        loader.apply_overrides(EnvOverrides {
            max_workers: Some(8),
            timeout_seconds: None,
            log_level: Some("DEBUG".to_string()),
        });

        assert_eq!(loader.get_u64("parallel.max_workers"), Some(8));
        assert_eq!(loader.get_u64("parallel.timeout_seconds"), None);
        assert_eq!(loader.get_string("logging.log_level"), Some("DEBUG".to_string()));
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_run_logger_follows_logging_section() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EnsembleConfig::default();
        assert!(ConfigurationLoader::from_config(config.clone()).run_logger().unwrap().is_none());

        let path = dir.path().join("runs").join("ensemble.md");
        config.logging.log_file = Some(path.to_string_lossy().to_string());
        config.logging.log_level = "debug".to_string();

        let logger = ConfigurationLoader::from_config(config).run_logger().unwrap().unwrap();
        assert_eq!(logger.log_file(), path.as_path());
        assert_eq!(logger.log_level(), "DEBUG");
        assert!(path.exists());
    }
}
