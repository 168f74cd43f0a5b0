use super::*;
use crate::orchestration::inference::{InferenceClient, InferenceError};
use crate::orchestration::types::AgentStatus;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Echo;

#[async_trait]
impl InferenceClient for Echo {
    async fn respond(&self, prompt: &str) -> Result<String, InferenceError> {
        Ok(prompt.to_string())
    }
}

/// Sleeps before echoing and tracks how many calls overlap.
#[derive(Default)]
struct Slow {
    delay_ms: u64,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Slow {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Default::default()
        }
    }
}

#[async_trait]
impl InferenceClient for Slow {
    async fn respond(&self, prompt: &str) -> Result<String, InferenceError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(prompt.to_string())
    }
}

struct Failing;

#[async_trait]
impl InferenceClient for Failing {
    async fn respond(&self, _prompt: &str) -> Result<String, InferenceError> {
        Err(InferenceError::Other("model overloaded".to_string()))
    }
}

struct Panicking;

#[async_trait]
impl InferenceClient for Panicking {
    async fn respond(&self, _prompt: &str) -> Result<String, InferenceError> {
        panic!("client bug");
    }
}

fn task(id: &str, client: Arc<dyn InferenceClient>, prompt: &str) -> ParallelTask {
    ParallelTask::new(AgentUnit::new(id, client), prompt)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_tasks_all_complete() {
    let executor = ParallelExecutor::new();
    let tasks: Vec<ParallelTask> = (0..5)
        .map(|i| task(&format!("agent-{}", i), Arc::new(Echo), &format!("task {}", i)))
        .collect();

    let results = executor.execute(tasks, true).await;
    assert_eq!(results.len(), 5);
    for i in 0..5 {
        let id = format!("agent-{}", i);
        assert_eq!(results[&id].status(), AgentStatus::Completed);
        assert_eq!(results[&id].output_text(), format!("task {}", i));
        assert_eq!(executor.memory().get_result(&id).unwrap(), results[&id]);
    }
    assert_eq!(executor.memory().registered_agents().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_bound_is_respected() {
    let slow = Arc::new(Slow::new(40));
    let executor = ParallelExecutor::with_config(
        SharedMemory::new(),
        ParallelConfig {
            max_workers: 2,
            timeout: None,
        },
    );
    assert_eq!(executor.max_workers(), 2);

    let tasks: Vec<ParallelTask> = (0..6)
        .map(|i| task(&format!("w{}", i), slow.clone(), "work"))
        .collect();
    let results = executor.execute(tasks, true).await;

    assert_eq!(results.len(), 6);
    assert!(slow.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_pool_is_reused_across_batches() {
    let executor = ParallelExecutor::with_config(
        SharedMemory::new(),
        ParallelConfig {
            max_workers: 1,
            timeout: None,
        },
    );
    let first = executor.execute(vec![task("a", Arc::new(Echo), "1")], true).await;
    let second = executor.execute(vec![task("b", Arc::new(Echo), "2")], true).await;

    // Each batch only reports its own tasks
    assert_eq!(first.keys().collect::<Vec<_>>(), ["a"]);
    assert_eq!(second.keys().collect::<Vec<_>>(), ["b"]);
    assert_eq!(executor.memory().all_results().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_is_isolated() {
    let executor = ParallelExecutor::new();
    let results = executor
        .execute(
            vec![
                task("ok", Arc::new(Echo), "fine"),
                task("bad", Arc::new(Failing), "boom"),
            ],
            true,
        )
        .await;

    assert_eq!(results["ok"].status(), AgentStatus::Completed);
    assert_eq!(results["bad"].status(), AgentStatus::Failed);
    assert_eq!(results["bad"].error(), Some("model overloaded"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_task_becomes_failed_result() {
    let executor = ParallelExecutor::new();
    let results = executor
        .execute(vec![task("p", Arc::new(Panicking), "x")], true)
        .await;

    assert_eq!(results["p"].status(), AgentStatus::Failed);
    assert!(results["p"].error().unwrap().contains("panicked"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_task_context_wins_over_shared_context() {
    let memory = SharedMemory::new();
    memory.set_context("tone", "formal");
    memory.set_context("audience", "engineers");
    let executor = ParallelExecutor::with_config(memory, ParallelConfig::default());

    let mut local = BTreeMap::new();
    local.insert("tone".to_string(), json!("casual"));
    let results = executor
        .execute(vec![task("w", Arc::new(Echo), "write").with_context(local)], true)
        .await;

    let output = results["w"].output_text();
    assert!(output.contains("- tone: casual"));
    assert!(output.contains("- audience: engineers"));
    assert!(!output.contains("formal"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_returns_partial_results_and_late_result_lands_in_memory() {
    let executor = ParallelExecutor::with_config(
        SharedMemory::new(),
        ParallelConfig {
            max_workers: 4,
            timeout: Some(Duration::from_millis(50)),
        },
    );

    let results = executor
        .execute(
            vec![
                task("fast", Arc::new(Echo), "quick"),
                task("slow", Arc::new(Slow::new(400)), "late"),
            ],
            true,
        )
        .await;

    assert!(results.contains_key("fast"));
    assert!(!results.contains_key("slow"));

    tokio::time::sleep(Duration::from_millis(800)).await;
    let late = executor.memory().get_result("slow").expect("late result stored");
    assert_eq!(late.output_text(), "late");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_without_wait_for_all_batch_is_still_joined() {
    let executor = ParallelExecutor::new();
    let results = executor
        .execute(
            vec![
                task("slow", Arc::new(Slow::new(100)), "bg"),
                task("quick", Arc::new(Echo), "fg"),
            ],
            false,
        )
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results["slow"].output_text(), "bg");
    assert_eq!(executor.memory().get_result("slow").unwrap(), results["slow"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_without_wait_for_all_timeout_returns_partial_results() {
    let executor = ParallelExecutor::with_config(
        SharedMemory::new(),
        ParallelConfig {
            max_workers: 4,
            timeout: Some(Duration::from_millis(50)),
        },
    );

    let results = executor
        .execute(
            vec![
                task("fast", Arc::new(Echo), "quick"),
                task("slow", Arc::new(Slow::new(400)), "late"),
            ],
            false,
        )
        .await;

    assert_eq!(results.keys().collect::<Vec<_>>(), ["fast"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_callback_sees_every_result() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let executor = ParallelExecutor::new();

    let results = executor
        .execute_with_callback(
            vec![
                task("a", Arc::new(Echo), "1"),
                task("b", Arc::new(Echo), "2"),
                task("c", Arc::new(Failing), "3"),
            ],
            move |agent_id, result| {
                sink.lock().unwrap().push((agent_id.to_string(), result.status()));
            },
        )
        .await;

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(results.len(), 3);
    assert_eq!(
        seen,
        vec![
            ("a".to_string(), AgentStatus::Completed),
            ("b".to_string(), AgentStatus::Completed),
            ("c".to_string(), AgentStatus::Failed),
        ]
    );
}

#[test]
fn test_default_config() {
    let config = ParallelConfig::default();
    assert!(config.max_workers >= 1);
    assert!(config.timeout.is_none());

    let clamped = ParallelExecutor::with_config(
        SharedMemory::new(),
        ParallelConfig {
            max_workers: 0,
            timeout: None,
        },
    );
    assert_eq!(clamped.max_workers(), 1);
}
