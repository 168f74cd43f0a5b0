//! Inference collaborator abstraction.
//!
//! The orchestration core never talks to a model directly. Each
//! [`AgentUnit`](super::AgentUnit) wraps one [`InferenceClient`], which turns
//! prompt text into response text and reports failures as [`InferenceError`].

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an inference collaborator.
///
/// Agent units only ever look at the `Display` text of this error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    /// The collaborator could not be reached.
    #[error("inference backend unreachable: {0}")]
    Unreachable(String),

    /// The collaborator rejected the request.
    #[error("inference request rejected: {0}")]
    Rejected(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for InferenceError {
    fn from(err: anyhow::Error) -> Self {
        InferenceError::Other(err.to_string())
    }
}

/// Trait implemented by anything able to answer a prompt.
///
/// # Example
///
/// ```
/// use agent_ensemble::orchestration::{InferenceClient, InferenceError};
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl InferenceClient for Echo {
///     async fn respond(&self, prompt: &str) -> Result<String, InferenceError> {
///         Ok(prompt.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Produce a response for the given prompt text.
    async fn respond(&self, prompt: &str) -> Result<String, InferenceError>;

    /// Produce a response with an optional system preamble.
    ///
    /// Clients without a notion of system instructions can rely on the
    /// default, which ignores the preamble.
    async fn respond_as(
        &self,
        preamble: Option<&str>,
        prompt: &str,
    ) -> Result<String, InferenceError> {
        let _ = preamble;
        self.respond(prompt).await
    }

    /// Client name for logging.
    fn name(&self) -> &str {
        "inference"
    }
}
