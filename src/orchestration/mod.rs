//! Multi-agent orchestration
//!
//! Building blocks for coordinating LLM-backed agents:
//! - [`AgentUnit`] wraps an [`InferenceClient`] with a role and capabilities
//! - [`SharedMemory`] is the message, result and context store every agent sees
//! - [`AgentChain`] runs single-agent steps in order, piping output forward
//! - [`ParallelExecutor`] fans independent tasks out over a bounded worker pool
//! - [`WorkflowOrchestrator`] walks a manually wired graph of named steps
//!
//! Inference failures never escape as errors. They come back as
//! [`AgentResult`]s with [`AgentStatus::Failed`]; only caller misuse is
//! reported through [`OrchestrationError`].

pub mod agent;
pub mod chain;
pub mod error;
pub mod inference;
pub mod memory;
pub mod parallel;
pub mod template;
pub mod types;
pub mod workflow;

pub use agent::{AgentProfile, AgentRole, AgentUnit};
pub use chain::{AgentChain, ChainCondition, ChainStep, ChainTransform};
pub use error::{OrchestrationError, OrchestrationResult};
pub use inference::{InferenceClient, InferenceError};
pub use memory::{MemoryConfig, MemorySummary, SharedMemory, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_RESULTS};
pub use parallel::{ParallelConfig, ParallelExecutor, ParallelTask, ResultCallback};
pub use template::{render_template, TemplateVars};
pub use types::{AgentMessage, AgentResult, AgentStatus, ResultMap};
pub use workflow::{
    StepPrompt, StepRecord, StepTransform, WorkflowCondition, WorkflowOrchestrator, WorkflowOutput,
    WorkflowStep, WorkflowSummary,
};
