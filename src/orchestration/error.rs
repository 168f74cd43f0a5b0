//! Error types for orchestration call-contract violations.
//!
//! Failures raised by the inference collaborator never show up here: they are
//! recovered into [`AgentResult`](super::AgentResult) records with status
//! `Failed`. Only caller misuse is reported through [`OrchestrationError`].

use thiserror::Error;

/// Result type for orchestration configuration operations
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

/// Errors raised synchronously to the caller when an orchestration API is misused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrchestrationError {
    /// A chain was requested from a workflow step that does not have exactly one agent.
    #[error("step '{step}' must have exactly one agent for chain (found {agents})")]
    MultiAgentStep {
        /// Name of the offending step.
        step: String,
        /// Number of agents the step declares.
        agents: usize,
    },

    /// A workflow step was declared without any agent.
    #[error("step '{step}' declares no agents")]
    EmptyStep {
        /// Name of the offending step.
        step: String,
    },

    /// An agent result was constructed in an inconsistent state.
    #[error("invalid agent result: {0}")]
    InvalidResult(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_step() {
        let err = OrchestrationError::MultiAgentStep {
            step: "review".to_string(),
            agents: 2,
        };
        assert!(err.to_string().contains("review"));
        assert!(err.to_string().contains("exactly one agent"));

        let err = OrchestrationError::EmptyStep {
            step: "draft".to_string(),
        };
        assert_eq!(err.to_string(), "step 'draft' declares no agents");
    }
}
