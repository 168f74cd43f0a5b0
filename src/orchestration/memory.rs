//! Shared memory for multi-agent runs.
//!
//! A single lock-protected store holding:
//! - the set of registered agent ids
//! - a capped, ordered message log (oldest evicted first)
//! - the latest result per agent, capped by count (oldest timestamp evicted first)
//! - an unbounded context map
//!
//! [`SharedMemory`] is a cheap handle: clones share the same state, which is
//! how one instance is injected into chains, parallel executors and
//! orchestrators.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::types::{AgentMessage, AgentResult};

/// Default cap on stored messages
pub const DEFAULT_MAX_MESSAGES: usize = 1000;
/// Default cap on stored results
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Capacity configuration for [`SharedMemory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of messages kept in the log
    pub max_messages: usize,
    /// Maximum number of per-agent results kept
    pub max_results: usize,
}

impl MemoryConfig {
    /// Build a config; caps below one are raised to one.
    pub fn new(max_messages: usize, max_results: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            max_results: max_results.max(1),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_MAX_RESULTS)
    }
}

/// Snapshot of the memory's size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySummary {
    /// Number of registered agents
    pub registered_agents: usize,
    /// Number of stored messages
    pub total_messages: usize,
    /// Number of stored results
    pub total_results: usize,
    /// Context keys, sorted
    pub context_keys: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    agent_ids: Vec<String>,
    messages: VecDeque<AgentMessage>,
    results: HashMap<String, AgentResult>,
    context: BTreeMap<String, serde_json::Value>,
}

/// Thread-safe message bus, result store and context map.
#[derive(Debug, Clone)]
pub struct SharedMemory {
    config: MemoryConfig,
    state: Arc<Mutex<MemoryState>>,
}

impl SharedMemory {
    /// Create an empty memory with default caps.
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Create an empty memory with custom caps.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            config: MemoryConfig::new(config.max_messages, config.max_results),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Capacity configuration
    pub fn config(&self) -> MemoryConfig {
        self.config
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Every mutation completes before its guard drops; poisoning is ignored.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an agent id. Registering twice is a no-op.
    pub fn register_agent(&self, agent_id: &str) {
        let mut state = self.lock();
        if !state.agent_ids.iter().any(|id| id == agent_id) {
            state.agent_ids.push(agent_id.to_string());
        }
    }

    /// Registered agent ids in registration order.
    pub fn registered_agents(&self) -> Vec<String> {
        self.lock().agent_ids.clone()
    }

    /// Whether an agent id is registered.
    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.lock().agent_ids.iter().any(|id| id == agent_id)
    }

    /// Send a message. When `store` is false the message is not kept in the log.
    pub fn send_message(&self, message: AgentMessage, store: bool) {
        if !store {
            return;
        }
        let mut state = self.lock();
        state.messages.push_back(message);
        while state.messages.len() > self.config.max_messages {
            state.messages.pop_front();
        }
    }

    /// Messages matching every supplied filter, in send order.
    ///
    /// * `sender` - exact sender id
    /// * `recipient` - exact recipient id; broadcasts never match a recipient filter
    /// * `limit` - keep only the newest `limit` matches; `Some(0)` means no limit
    pub fn get_messages(
        &self,
        sender: Option<&str>,
        recipient: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<AgentMessage> {
        let state = self.lock();
        let mut filtered: Vec<AgentMessage> = state
            .messages
            .iter()
            .filter(|m| sender.map_or(true, |s| m.sender() == s))
            .filter(|m| recipient.map_or(true, |r| m.recipient() == Some(r)))
            .cloned()
            .collect();

        if let Some(limit) = limit.filter(|l| *l > 0) {
            if filtered.len() > limit {
                filtered.drain(..filtered.len() - limit);
            }
        }
        filtered
    }

    /// Messages addressed to `agent_id`.
    pub fn messages_for(&self, agent_id: &str) -> Vec<AgentMessage> {
        self.get_messages(None, Some(agent_id), None)
    }

    /// Every stored message, in send order.
    pub fn all_messages(&self) -> Vec<AgentMessage> {
        self.lock().messages.iter().cloned().collect()
    }

    /// Store a result, replacing the previous one for the same agent.
    ///
    /// When the store grows past its cap, the entries with the oldest
    /// timestamps are evicted.
    pub fn store_result(&self, result: AgentResult) {
        let mut state = self.lock();
        state.results.insert(result.agent_id().to_string(), result);

        let overflow = state.results.len().saturating_sub(self.config.max_results);
        if overflow > 0 {
            let mut by_age: Vec<(String, chrono::DateTime<chrono::Utc>)> = state
                .results
                .iter()
                .map(|(id, r)| (id.clone(), r.timestamp()))
                .collect();
            by_age.sort_by(|a, b| a.1.cmp(&b.1));
            for (id, _) in by_age.into_iter().take(overflow) {
                state.results.remove(&id);
            }
        }
    }

    /// Latest result for an agent.
    pub fn get_result(&self, agent_id: &str) -> Option<AgentResult> {
        self.lock().results.get(agent_id).cloned()
    }

    /// Copy of every stored result.
    pub fn all_results(&self) -> BTreeMap<String, AgentResult> {
        self.lock()
            .results
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set a context value.
    pub fn set_context(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.lock().context.insert(key.into(), value.into());
    }

    /// Get a context value.
    pub fn get_context(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().context.get(key).cloned()
    }

    /// Get a context value or a default.
    pub fn get_context_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.get_context(key).unwrap_or(default)
    }

    /// Merge several context values.
    pub fn update_context<I, K>(&self, updates: I)
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let mut state = self.lock();
        for (key, value) in updates {
            state.context.insert(key.into(), value);
        }
    }

    /// Snapshot of the whole context.
    pub fn context(&self) -> BTreeMap<String, serde_json::Value> {
        self.lock().context.clone()
    }

    /// Remove every context value.
    pub fn clear_context(&self) {
        self.lock().context.clear();
    }

    /// Remove every message.
    pub fn clear_messages(&self) {
        self.lock().messages.clear();
    }

    /// Remove every result.
    pub fn clear_results(&self) {
        self.lock().results.clear();
    }

    /// Remove messages, results and context. Registrations are kept.
    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.messages.clear();
        state.results.clear();
        state.context.clear();
    }

    /// Size summary.
    pub fn summary(&self) -> MemorySummary {
        let state = self.lock();
        MemorySummary {
            registered_agents: state.agent_ids.len(),
            total_messages: state.messages.len(),
            total_results: state.results.len(),
            context_keys: state.context.keys().cloned().collect(),
        }
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new()
    }
}
