//! Configuration management for agent ensembles.
//!
//! This module provides configuration loading through TOML files and
//! environment variable overrides via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use agent_ensemble::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! let env = EnvironmentLoader::new(None);
//!
//! let mut loader = ConfigurationLoader::new(Some(Path::new("config/ensemble.toml"))).unwrap();
//! loader.apply_env(&env);
//!
//! let orchestrator = loader.orchestrator();
//! println!("Max workers: {}", loader.parallel_config().max_workers);
//! # drop(orchestrator);
//! ```

pub mod config;
pub mod environment;

pub use self::config::{
    ChainSection, ConfigurationLoader, EnsembleConfig, LoggingConfig, MemorySection, ParallelSection,
};
pub use self::environment::{EnvOverrides, EnvironmentLoader};
