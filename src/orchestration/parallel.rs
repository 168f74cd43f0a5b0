//! Parallel agent execution over a bounded worker pool.
//!
//! Tasks are spawned onto the tokio runtime and gated by a semaphore owned by
//! the executor, so the worker bound holds across every batch it runs. Every
//! batch is joined before returning. The batch timeout only limits how long
//! the caller waits: tasks still running
//! when it expires are not cancelled and will write their results into shared
//! memory whenever they finish.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::agent::AgentUnit;
use super::memory::SharedMemory;
use super::types::{AgentResult, ResultMap};

/// Callback invoked with `(agent_id, result)` as each task finishes
pub type ResultCallback = Arc<dyn Fn(&str, &AgentResult) + Send + Sync>;

/// A unit of work for [`ParallelExecutor`]
#[derive(Debug, Clone)]
pub struct ParallelTask {
    agent: AgentUnit,
    prompt: String,
    context: BTreeMap<String, serde_json::Value>,
    name: String,
}

impl ParallelTask {
    /// Create a task. The name defaults to the agent id.
    pub fn new(agent: AgentUnit, prompt: impl Into<String>) -> Self {
        let name = agent.agent_id().to_string();
        Self {
            agent,
            prompt: prompt.into(),
            context: BTreeMap::new(),
            name,
        }
    }

    /// Task-local context. These keys win over shared context keys.
    pub fn with_context(mut self, context: BTreeMap<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Set a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Agent run by this task.
    pub fn agent(&self) -> &AgentUnit {
        &self.agent
    }

    /// Prompt for the agent.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Parallel executor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Maximum number of tasks running at once
    pub max_workers: usize,
    /// Maximum time to wait for a batch
    pub timeout: Option<Duration>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: default_workers(),
            timeout: None,
        }
    }
}

/// Available parallelism, or one when it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Executes independent agent tasks concurrently.
#[derive(Debug, Clone)]
pub struct ParallelExecutor {
    memory: SharedMemory,
    config: ParallelConfig,
    workers: Arc<Semaphore>,
}

impl ParallelExecutor {
    /// Executor with its own shared memory and default configuration.
    pub fn new() -> Self {
        Self::with_config(SharedMemory::new(), ParallelConfig::default())
    }

    /// Executor on an existing shared memory.
    pub fn with_config(memory: SharedMemory, config: ParallelConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        Self {
            memory,
            config: ParallelConfig {
                max_workers,
                timeout: config.timeout,
            },
            workers: Arc::new(Semaphore::new(max_workers)),
        }
    }

    /// Shared memory results are stored in.
    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    /// Worker bound, at least one.
    pub fn max_workers(&self) -> usize {
        self.config.max_workers
    }

    /// Batch timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    /// Run a batch of tasks.
    ///
    /// The call returns once every task finished or the timeout elapsed, with
    /// the results that were in by then. `wait_for_all` only changes how an
    /// expired timeout is reported: as a warning when set, as an error naming
    /// the unfinished agents when not.
    pub async fn execute(&self, tasks: Vec<ParallelTask>, wait_for_all: bool) -> ResultMap {
        self.run_batch(tasks, None, wait_for_all).await
    }

    /// Run a batch, calling `callback` as each task finishes.
    ///
    /// The callback runs under the same lock that records the result, so
    /// invocations never overlap. Always waits for the batch (or the timeout).
    pub async fn execute_with_callback<F>(&self, tasks: Vec<ParallelTask>, callback: F) -> ResultMap
    where
        F: Fn(&str, &AgentResult) + Send + Sync + 'static,
    {
        self.run_batch(tasks, Some(Arc::new(callback)), true).await
    }

    async fn run_batch(
        &self,
        tasks: Vec<ParallelTask>,
        callback: Option<ResultCallback>,
        wait_for_all: bool,
    ) -> ResultMap {
        for task in &tasks {
            self.memory.register_agent(task.agent.agent_id());
        }

        let batch: Arc<Mutex<ResultMap>> = Arc::new(Mutex::new(BTreeMap::new()));
        let mut handles = Vec::with_capacity(tasks.len());

        info!(tasks = tasks.len(), max_workers = self.config.max_workers, "dispatching parallel batch");

        for task in tasks {
            let agent_id = task.agent.agent_id().to_string();
            let workers = Arc::clone(&self.workers);
            let memory = self.memory.clone();
            let batch = Arc::clone(&batch);
            let callback = callback.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };

                let messages = memory.messages_for(task.agent.agent_id());
                let mut context = memory.context();
                context.extend(task.context.clone());

                debug!(task = %task.name, agent = %task.agent.agent_id(), "running parallel task");
                let result = task.agent.execute(&task.prompt, Some(&context), Some(&messages)).await;

                commit(&batch, &memory, callback.as_ref(), result);
            });
            handles.push((agent_id, handle));
        }

        self.join(handles, &batch, callback.as_ref(), wait_for_all).await;

        let results = batch.lock().unwrap_or_else(PoisonError::into_inner).clone();
        results
    }

    async fn join(
        &self,
        handles: Vec<(String, tokio::task::JoinHandle<()>)>,
        batch: &Arc<Mutex<ResultMap>>,
        callback: Option<&ResultCallback>,
        wait_for_all: bool,
    ) {
        let pending: Vec<String> = handles.iter().map(|(id, _)| id.clone()).collect();
        let memory = self.memory.clone();
        let sink = Arc::clone(batch);
        let callback = callback.cloned();

        let (agent_ids, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();

        let wait_all = async move {
            let joined = join_all(handles).await;
            for (agent_id, outcome) in agent_ids.into_iter().zip(joined) {
                if let Err(e) = outcome {
                    if e.is_panic() {
                        warn!(agent = %agent_id, "parallel task panicked");
                        let result = AgentResult::failed(&agent_id, format!("agent task panicked: {}", e), Duration::ZERO);
                        commit(&sink, &memory, callback.as_ref(), result);
                    }
                }
            }
        };

        match self.config.timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, wait_all).await.is_err() {
                    let timeout_ms = limit.as_millis() as u64;
                    if wait_for_all {
                        warn!(timeout_ms, "parallel batch timed out; unfinished tasks keep running");
                    } else {
                        let finished = batch_ids(batch);
                        let unfinished: Vec<&str> = pending
                            .iter()
                            .filter(|id| !finished.contains(*id))
                            .map(String::as_str)
                            .collect();
                        error!(timeout_ms, ?unfinished, "parallel tasks did not complete before the timeout");
                    }
                }
            }
            None => wait_all.await,
        }
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn batch_ids(batch: &Mutex<ResultMap>) -> Vec<String> {
    batch
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect()
}

/// Record a finished task in shared memory and the batch map under one lock.
fn commit(
    batch: &Mutex<ResultMap>,
    memory: &SharedMemory,
    callback: Option<&ResultCallback>,
    result: AgentResult,
) {
    let mut batch = batch.lock().unwrap_or_else(PoisonError::into_inner);
    memory.store_result(result.clone());
    if let Some(callback) = callback {
        callback(result.agent_id(), &result);
    }
    batch.insert(result.agent_id().to_string(), result);
}

#[cfg(test)]
mod tests;
