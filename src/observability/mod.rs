//! Observability utilities for agent ensembles.
//!
//! Runtime events go through `tracing`; no subscriber is installed here.
//! [`RunLogger`] additionally keeps a human-readable markdown record of
//! workflow runs.
//!
//! # Example
//!
//! ```no_run
//! use agent_ensemble::observability::RunLogger;
//!
//! let logger = RunLogger::new(None, Some("DEBUG")).unwrap();
//! logger.log_workflow_start("triage this bug report", "classify").unwrap();
//! logger.log_completion("assigned to backend").unwrap();
//! ```

pub mod logger;

pub use logger::RunLogger;
