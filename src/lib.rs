//! Agent Ensemble - coordination core for multi-agent LLM systems
//!
//! Agent Ensemble provides feature-gated modules for running several
//! LLM-backed agents together:
//!
//! - **`orchestration`** - agents, shared memory, chains, parallel execution and workflows
//! - **`config`** - TOML configuration and `ENSEMBLE_*` environment overrides
//! - **`observability`** - markdown run logs alongside `tracing` events
//!
//! # Features
//!
//! All three features are on by default:
//!
//! ```toml
//! [dependencies]
//! agent-ensemble = "0.1"
//! # Or only the core:
//! agent-ensemble = { version = "0.1", default-features = false, features = ["orchestration"] }
//! ```
//!
//! # Example: a two-step chain
//!
//! ```
//! use agent_ensemble::orchestration::{
//!     AgentChain, AgentUnit, ChainStep, InferenceClient, InferenceError,
//! };
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl InferenceClient for Echo {
//!     async fn respond(&self, prompt: &str) -> Result<String, InferenceError> {
//!         Ok(prompt.to_string())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let chain = AgentChain::new(vec![
//!     ChainStep::new(AgentUnit::new("first", Arc::new(Echo)), "echo your input: {input}"),
//!     ChainStep::new(AgentUnit::new("second", Arc::new(Echo)), "reverse: {previous_output}"),
//! ]);
//!
//! let results = chain.execute("hello", None).await;
//! assert_eq!(results[1].output_text(), "reverse: echo your input: hello");
//! # });
//! ```
//!
//! # Example: configured workflow
//!
//! ```no_run
//! use agent_ensemble::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! let mut loader = ConfigurationLoader::new(Some(Path::new("config/ensemble.toml"))).unwrap();
//! loader.apply_env(&EnvironmentLoader::new(None));
//!
//! let orchestrator = loader.orchestrator();
//! println!("{:?}", orchestrator.workflow_summary());
//! ```

#![warn(missing_docs)]

/// Multi-agent orchestration (enabled with the `orchestration` feature)
#[cfg(feature = "orchestration")]
pub mod orchestration;

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "config")]
    pub use crate::config::{ConfigurationLoader, EnsembleConfig, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::RunLogger;

    #[cfg(feature = "orchestration")]
    pub use crate::orchestration::{
        AgentChain, AgentMessage, AgentResult, AgentRole, AgentStatus, AgentUnit, ChainStep,
        InferenceClient, InferenceError, OrchestrationError, ParallelExecutor, ParallelTask,
        SharedMemory, WorkflowCondition, WorkflowOrchestrator, WorkflowStep,
    };
}
