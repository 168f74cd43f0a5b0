//! Value records exchanged between agents, executors and shared memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::error::{OrchestrationError, OrchestrationResult};

/// Per-agent results keyed by agent id.
pub type ResultMap = BTreeMap<String, AgentResult>;

/// Status of an agent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Not yet started
    Pending,
    /// Currently running
    Running,
    /// Finished with an output
    Completed,
    /// Finished with an error
    Failed,
    /// Executed but not used to advance the pipeline
    Skipped,
}

impl AgentStatus {
    /// Lowercase name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the execution is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(OrchestrationError::Config(format!(
                "Invalid agent status: {}",
                s
            ))),
        }
    }
}

/// Message passed between agents.
///
/// A message without a recipient is a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    sender: String,
    recipient: Option<String>,
    content: String,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
    message_id: Option<String>,
}

impl AgentMessage {
    /// Create a broadcast message stamped with the current time.
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: None,
            content: content.into(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
            message_id: None,
        }
    }

    /// Address the message to a single agent.
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the message id.
    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    /// Override the creation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sending agent id.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Recipient agent id; `None` for broadcasts.
    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    /// Message text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Arbitrary metadata.
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Message id, if one was assigned.
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// True when the message has no recipient.
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}

/// Result of one agent execution.
///
/// Records are immutable once built; the consuming `with_*` / `into_*`
/// methods return new records. A `Failed` result always carries error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    agent_id: String,
    status: AgentStatus,
    output: Option<serde_json::Value>,
    error: Option<String>,
    #[serde(rename = "execution_time", with = "duration_secs")]
    duration: Duration,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
    timestamp: DateTime<Utc>,
}

impl AgentResult {
    /// Build a result, validating that a failed status carries an error.
    pub fn new(
        agent_id: impl Into<String>,
        status: AgentStatus,
        output: Option<serde_json::Value>,
        error: Option<String>,
    ) -> OrchestrationResult<Self> {
        let agent_id = agent_id.into();
        if status == AgentStatus::Failed && error.as_deref().map_or(true, str::is_empty) {
            return Err(OrchestrationError::InvalidResult(format!(
                "failed result for '{}' has no error description",
                agent_id
            )));
        }
        Ok(Self {
            agent_id,
            status,
            output,
            error,
            duration: Duration::ZERO,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        })
    }

    /// Successful execution with an output.
    pub fn completed(
        agent_id: impl Into<String>,
        output: impl Into<serde_json::Value>,
        duration: Duration,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: AgentStatus::Completed,
            output: Some(output.into()),
            error: None,
            duration,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Failed execution.
    pub fn failed(agent_id: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            agent_id: agent_id.into(),
            status: AgentStatus::Failed,
            output: None,
            error: Some(error),
            duration,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Result for an agent that was not executed.
    pub fn skipped(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: AgentStatus::Skipped,
            output: None,
            error: None,
            duration: Duration::ZERO,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Same record, re-labelled as skipped. Output and timing are kept.
    pub fn into_skipped(mut self) -> Self {
        self.status = AgentStatus::Skipped;
        self
    }

    /// Agent that produced the result.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Execution status.
    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Raw output value.
    pub fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }

    /// Error text of a failed execution.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Wall-clock execution time.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Arbitrary metadata.
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether the status is `Completed`.
    pub fn is_completed(&self) -> bool {
        self.status == AgentStatus::Completed
    }

    /// Whether the status is `Failed`.
    pub fn is_failed(&self) -> bool {
        self.status == AgentStatus::Failed
    }

    /// Output rendered as text. Strings are returned verbatim, other JSON
    /// values are serialized, a missing output is the empty string.
    pub fn output_text(&self) -> String {
        self.output.as_ref().map(value_to_text).unwrap_or_default()
    }
}

/// Render an opaque value as prompt text.
pub(crate) fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trip_names() {
        assert_eq!(AgentStatus::Completed.to_string(), "completed");
        assert_eq!("FAILED".parse::<AgentStatus>().unwrap(), AgentStatus::Failed);
        assert!("done".parse::<AgentStatus>().is_err());
        assert!(!AgentStatus::Running.is_terminal());
        assert!(AgentStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_failed_result_requires_error() {
        let err = AgentResult::new("a", AgentStatus::Failed, None, None).unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidResult(_)));

        let ok = AgentResult::new("a", AgentStatus::Failed, None, Some("boom".into())).unwrap();
        assert_eq!(ok.error(), Some("boom"));

        let failed = AgentResult::failed("a", "", Duration::ZERO);
        assert_eq!(failed.error(), Some("unknown error"));
    }

    #[test]
    fn test_output_text() {
        let text = AgentResult::completed("a", "hello", Duration::ZERO);
        assert_eq!(text.output_text(), "hello");

        let structured = AgentResult::completed("a", json!({"score": 3}), Duration::ZERO);
        assert_eq!(structured.output_text(), r#"{"score":3}"#);

        assert_eq!(AgentResult::skipped("a").output_text(), "");
    }

    #[test]
    fn test_into_skipped_keeps_output() {
        let result = AgentResult::completed("a", "draft", Duration::from_millis(5)).into_skipped();
        assert_eq!(result.status(), AgentStatus::Skipped);
        assert_eq!(result.output_text(), "draft");
        assert_eq!(result.duration(), Duration::from_millis(5));
    }

    #[test]
    fn test_result_serialized_shape() {
        let result = AgentResult::completed("writer", "text", Duration::from_millis(1500));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["agent_id"], "writer");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["output"], "text");
        assert_eq!(value["error"], serde_json::Value::Null);
        assert_eq!(value["execution_time"], 1.5);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_message_builders() {
        let msg = AgentMessage::new("planner", "plan ready")
            .to("executor")
            .with_id("m-1");
        assert_eq!(msg.sender(), "planner");
        assert_eq!(msg.recipient(), Some("executor"));
        assert_eq!(msg.message_id(), Some("m-1"));
        assert!(!msg.is_broadcast());
        assert!(AgentMessage::new("planner", "hi").is_broadcast());
    }
}
