//! Agent units: identity, role and capabilities around one inference client.

use serde::{Deserialize, Serialize};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::inference::{InferenceClient, InferenceError};
use super::types::{AgentMessage, AgentResult};

/// Built-in agent roles.
///
/// Every role except [`AgentRole::Custom`] comes with a default preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Researches topics
    Researcher,
    /// Writes content
    Writer,
    /// Analyzes data
    Analyzer,
    /// Writes code
    Coder,
    /// Reviews work
    Reviewer,
    /// Translates text
    Translator,
    /// Summarizes content
    Summarizer,
    /// Plans tasks
    Planner,
    /// Executes plans
    Executor,
    /// Validates results
    Validator,
    /// No built-in behaviour
    Custom,
}

impl AgentRole {
    /// Lowercase role name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Researcher => "researcher",
            Self::Writer => "writer",
            Self::Analyzer => "analyzer",
            Self::Coder => "coder",
            Self::Reviewer => "reviewer",
            Self::Translator => "translator",
            Self::Summarizer => "summarizer",
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Validator => "validator",
            Self::Custom => "custom",
        }
    }

    /// Default instruction preamble for the role. `None` for custom agents.
    pub fn default_preamble(&self) -> Option<&'static str> {
        let preamble = match self {
            Self::Researcher => "You are a research specialist. Your role is to research topics thoroughly and provide comprehensive, well-sourced information.",
            Self::Writer => "You are a professional writer. Your role is to create clear, engaging, and well-structured content based on provided information.",
            Self::Analyzer => "You are a data analyst. Your role is to analyze information, identify patterns, and provide insights.",
            Self::Coder => "You are a software engineer. Your role is to write clean, efficient, and well-documented code.",
            Self::Reviewer => "You are a quality reviewer. Your role is to review content, code, or analysis and provide constructive feedback.",
            Self::Translator => "You are a professional translator. Your role is to translate text accurately while preserving meaning and context.",
            Self::Summarizer => "You are a summarization specialist. Your role is to create concise, accurate summaries of provided content.",
            Self::Planner => "You are a strategic planner. Your role is to create detailed plans and break down complex tasks into steps.",
            Self::Executor => "You are an executor. Your role is to execute tasks based on provided plans and instructions.",
            Self::Validator => "You are a validator. Your role is to validate results, check for errors, and ensure quality standards.",
            Self::Custom => return None,
        };
        Some(preamble)
    }
}

impl Default for AgentRole {
    fn default() -> Self {
        Self::Custom
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "researcher" => Ok(Self::Researcher),
            "writer" => Ok(Self::Writer),
            "analyzer" => Ok(Self::Analyzer),
            "coder" => Ok(Self::Coder),
            "reviewer" => Ok(Self::Reviewer),
            "translator" => Ok(Self::Translator),
            "summarizer" => Ok(Self::Summarizer),
            "planner" => Ok(Self::Planner),
            "executor" => Ok(Self::Executor),
            "validator" => Ok(Self::Validator),
            "custom" => Ok(Self::Custom),
            _ => Err(anyhow::anyhow!("Invalid agent role: {}", s)),
        }
    }
}

/// Serializable description of an agent unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent id
    pub agent_id: String,
    /// Role
    pub role: AgentRole,
    /// Free-form description
    pub description: Option<String>,
    /// Capability tags
    pub capabilities: Vec<String>,
    /// Ids of agents this one depends on
    pub dependencies: Vec<String>,
}

/// One agent taking part in a multi-agent workflow.
///
/// Cloning is cheap; clones share the same inference client.
#[derive(Clone)]
pub struct AgentUnit {
    agent_id: String,
    client: Arc<dyn InferenceClient>,
    role: AgentRole,
    preamble: Option<String>,
    description: Option<String>,
    capabilities: Vec<String>,
    dependencies: Vec<String>,
}

impl std::fmt::Debug for AgentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentUnit")
            .field("agent_id", &self.agent_id)
            .field("client", &self.client.name())
            .field("role", &self.role)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl AgentUnit {
    /// Create an agent with the custom role and no preamble.
    pub fn new(agent_id: impl Into<String>, client: Arc<dyn InferenceClient>) -> Self {
        Self {
            agent_id: agent_id.into(),
            client,
            role: AgentRole::Custom,
            preamble: None,
            description: None,
            capabilities: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set the role. Unless a preamble was given explicitly, the role's
    /// default preamble is adopted here, once.
    pub fn with_role(mut self, role: AgentRole) -> Self {
        let explicit = self
            .preamble
            .as_deref()
            .filter(|p| Some(*p) != self.role.default_preamble())
            .map(str::to_string);
        self.role = role;
        self.preamble = explicit.or_else(|| role.default_preamble().map(str::to_string));
        self
    }

    /// Set an explicit preamble, overriding the role default.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    /// Set a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set capability tags used by [`can_handle`](Self::can_handle).
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Declare ids of agents this one depends on. Informational only.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Unique id of the agent.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Role of the agent.
    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Resolved system preamble.
    pub fn preamble(&self) -> Option<&str> {
        self.preamble.as_deref()
    }

    /// Description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Capability tags.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Declared dependencies.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Execute the agent.
    ///
    /// The prompt is enriched with a `Context:` block and a
    /// `Messages from other agents:` block when those are non-empty. Any
    /// failure from the inference client, a panic included, is returned as a
    /// `Failed` result.
    pub async fn execute(
        &self,
        prompt: &str,
        context: Option<&BTreeMap<String, serde_json::Value>>,
        messages: Option<&[AgentMessage]>,
    ) -> AgentResult {
        let start = Instant::now();
        let enhanced = build_prompt(prompt, context, messages);

        debug!(agent = %self.agent_id, role = %self.role, prompt_len = enhanced.len(), "executing agent");

        let outcome = AssertUnwindSafe(self.client.respond_as(self.preamble.as_deref(), &enhanced))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(InferenceError::Other(format!(
                    "inference client panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match outcome {
            Ok(output) => {
                let mut metadata = HashMap::new();
                metadata.insert("role".to_string(), serde_json::Value::from(self.role.as_str()));
                metadata.insert("prompt_length".to_string(), serde_json::Value::from(prompt.chars().count()));
                metadata.insert("output_length".to_string(), serde_json::Value::from(output.chars().count()));
                AgentResult::completed(&self.agent_id, output, start.elapsed()).with_metadata(metadata)
            }
            Err(e) => {
                warn!(agent = %self.agent_id, error = %e, "agent execution failed");
                AgentResult::failed(&self.agent_id, e.to_string(), start.elapsed())
            }
        }
    }

    /// Build a message from this agent. A fresh message id is assigned.
    pub fn create_message(
        &self,
        content: impl Into<String>,
        recipient: Option<&str>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> AgentMessage {
        let mut message = AgentMessage::new(&self.agent_id, content)
            .with_metadata(metadata.unwrap_or_default())
            .with_id(uuid::Uuid::new_v4().to_string());
        if let Some(recipient) = recipient {
            message = message.to(recipient);
        }
        message
    }

    /// Whether the agent's capabilities cover `task`.
    ///
    /// Agents without capabilities accept everything; otherwise one capability
    /// must occur in the task text, ignoring case.
    pub fn can_handle(&self, task: &str) -> bool {
        if self.capabilities.is_empty() {
            return true;
        }
        let task = task.to_lowercase();
        self.capabilities
            .iter()
            .any(|cap| task.contains(&cap.to_lowercase()))
    }

    /// Serializable description of this agent.
    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            agent_id: self.agent_id.clone(),
            role: self.role,
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn build_prompt(
    prompt: &str,
    context: Option<&BTreeMap<String, serde_json::Value>>,
    messages: Option<&[AgentMessage]>,
) -> String {
    let mut parts = vec![prompt.to_string()];

    if let Some(context) = context.filter(|c| !c.is_empty()) {
        let mut block = String::from("\n\nContext:\n");
        for (key, value) in context {
            block.push_str(&format!("- {}: {}\n", key, super::types::value_to_text(value)));
        }
        parts.push(block);
    }

    if let Some(messages) = messages.filter(|m| !m.is_empty()) {
        let mut block = String::from("\n\nMessages from other agents:\n");
        for msg in messages {
            block.push_str(&format!("[{}]: {}\n", msg.sender(), msg.content()));
        }
        parts.push(block);
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::inference::InferenceError;
    use crate::orchestration::types::AgentStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call and echoes the prompt back.
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(Option<String>, String)>>,
    }

    #[async_trait]
    impl InferenceClient for RecordingClient {
        async fn respond(&self, prompt: &str) -> Result<String, InferenceError> {
            self.respond_as(None, prompt).await
        }

        async fn respond_as(&self, preamble: Option<&str>, prompt: &str) -> Result<String, InferenceError> {
            self.calls
                .lock()
                .unwrap()
                .push((preamble.map(str::to_string), prompt.to_string()));
            Ok(prompt.to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl InferenceClient for Unreachable {
        async fn respond(&self, _prompt: &str) -> Result<String, InferenceError> {
            Err(InferenceError::Unreachable("connection refused".to_string()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl InferenceClient for Panicking {
        async fn respond(&self, _prompt: &str) -> Result<String, InferenceError> {
            panic!("tokenizer state corrupted");
        }
    }

    #[tokio::test]
    async fn test_panicking_client_becomes_failed_result() {
        let agent = AgentUnit::new("fragile", Arc::new(Panicking));
        let result = agent.execute("hello", None, None).await;

        assert_eq!(result.status(), AgentStatus::Failed);
        assert_eq!(
            result.error(),
            Some("inference client panicked: tokenizer state corrupted")
        );
    }

    #[tokio::test]
    async fn test_execute_plain_prompt() {
        let agent = AgentUnit::new("echo", Arc::new(RecordingClient::default()));
        let result = agent.execute("hello", None, None).await;
        assert_eq!(result.status(), AgentStatus::Completed);
        assert_eq!(result.output_text(), "hello");
        assert_eq!(result.metadata()["role"], json!("custom"));
        assert_eq!(result.metadata()["prompt_length"], json!(5));
        assert_eq!(result.metadata()["output_length"], json!(5));
    }

    #[tokio::test]
    async fn test_execute_includes_context_and_messages() {
        let agent = AgentUnit::new("echo", Arc::new(RecordingClient::default()));
        let mut context = BTreeMap::new();
        context.insert("project".to_string(), json!("ensemble"));
        context.insert("budget".to_string(), json!(3));
        let messages = vec![AgentMessage::new("planner", "plan ready").to("echo")];

        let result = agent.execute("go", Some(&context), Some(&messages)).await;
        assert_eq!(
            result.output_text(),
            "go\n\n\nContext:\n- budget: 3\n- project: ensemble\n\n\n\nMessages from other agents:\n[planner]: plan ready\n"
        );
    }

    #[tokio::test]
    async fn test_empty_context_adds_nothing() {
        let agent = AgentUnit::new("echo", Arc::new(RecordingClient::default()));
        let result = agent.execute("go", Some(&BTreeMap::new()), Some(&[])).await;
        assert_eq!(result.output_text(), "go");
    }

    #[tokio::test]
    async fn test_failure_becomes_failed_result() {
        let agent = AgentUnit::new("down", Arc::new(Unreachable));
        let result = agent.execute("anything", None, None).await;
        assert_eq!(result.status(), AgentStatus::Failed);
        assert_eq!(result.error(), Some("inference backend unreachable: connection refused"));
        assert!(result.output().is_none());
    }

    #[tokio::test]
    async fn test_role_preamble_is_passed_to_client() {
        let client = Arc::new(RecordingClient::default());
        let agent = AgentUnit::new("r", client.clone()).with_role(AgentRole::Researcher);
        agent.execute("topic", None, None).await;

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0].0.as_deref(), AgentRole::Researcher.default_preamble());
    }

    #[test]
    fn test_preamble_resolution() {
        let client: Arc<dyn InferenceClient> = Arc::new(RecordingClient::default());

        let custom = AgentUnit::new("c", client.clone());
        assert!(custom.preamble().is_none());

        let explicit = AgentUnit::new("w", client.clone())
            .with_preamble("Write haiku only.")
            .with_role(AgentRole::Writer);
        assert_eq!(explicit.preamble(), Some("Write haiku only."));

        let switched = AgentUnit::new("s", client)
            .with_role(AgentRole::Writer)
            .with_role(AgentRole::Coder);
        assert_eq!(switched.preamble(), AgentRole::Coder.default_preamble());
    }

    #[test]
    fn test_can_handle() {
        let client: Arc<dyn InferenceClient> = Arc::new(RecordingClient::default());
        let open = AgentUnit::new("open", client.clone());
        assert!(open.can_handle("anything at all"));

        let coder = AgentUnit::new("coder", client).with_capabilities(["Rust", "python"]);
        assert!(coder.can_handle("port this PYTHON script"));
        assert!(coder.can_handle("write rust"));
        assert!(!coder.can_handle("translate to french"));
    }

    #[test]
    fn test_create_message_and_profile() {
        let client: Arc<dyn InferenceClient> = Arc::new(RecordingClient::default());
        let agent = AgentUnit::new("planner", client)
            .with_role(AgentRole::Planner)
            .with_description("Creates plans")
            .with_dependencies(["researcher"]);

        let msg = agent.create_message("plan", Some("executor"), None);
        assert_eq!(msg.sender(), "planner");
        assert_eq!(msg.recipient(), Some("executor"));
        assert!(msg.message_id().is_some());

        let profile = agent.profile();
        assert_eq!(profile.role, AgentRole::Planner);
        assert_eq!(profile.dependencies, vec!["researcher"]);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["role"], "planner");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Reviewer".parse::<AgentRole>().unwrap(), AgentRole::Reviewer);
        assert!("pilot".parse::<AgentRole>().is_err());
        assert!(AgentRole::Custom.default_preamble().is_none());
    }
}
