//! Workflow orchestration - named step graph with conditional branching

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::agent::AgentUnit;
use super::chain::{AgentChain, ChainCondition, ChainStep, ChainTransform};
use super::error::{OrchestrationError, OrchestrationResult};
use super::memory::{MemorySummary, SharedMemory};
use super::parallel::{ParallelConfig, ParallelExecutor, ParallelTask};
use super::types::{AgentResult, ResultMap};

#[cfg(feature = "observability")]
use crate::observability::RunLogger;

/// Predicate over the results accumulated so far
pub type ConditionCheck = Arc<dyn Fn(&ResultMap) -> bool + Send + Sync>;

/// Turns a step's results into the next step's input
pub type StepTransform = Arc<dyn Fn(&ResultMap) -> String + Send + Sync>;

/// Guard deciding whether a workflow step runs
#[derive(Clone)]
pub struct WorkflowCondition {
    check: ConditionCheck,
    description: Option<String>,
}

impl WorkflowCondition {
    /// Create a condition from a predicate.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&ResultMap) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
            description: None,
        }
    }

    /// Attach a human-readable description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Evaluate against accumulated results.
    pub fn check(&self, results: &ResultMap) -> bool {
        (self.check)(results)
    }

    /// Human-readable description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl std::fmt::Debug for WorkflowCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCondition")
            .field("description", &self.description)
            .finish()
    }
}

/// Prompt(s) for a workflow step
#[derive(Debug, Clone, PartialEq)]
pub enum StepPrompt {
    /// Same prompt for every agent of the step
    Shared(String),
    /// Prompt per agent id, in declaration order
    PerAgent(Vec<(String, String)>),
}

impl StepPrompt {
    /// Prompt for `agent_id`. Agents without an entry get the first declared prompt.
    pub fn for_agent(&self, agent_id: &str) -> &str {
        match self {
            Self::Shared(prompt) => prompt,
            Self::PerAgent(prompts) => prompts
                .iter()
                .find(|(id, _)| id == agent_id)
                .or_else(|| prompts.first())
                .map(|(_, prompt)| prompt.as_str())
                .unwrap_or(""),
        }
    }
}

impl From<&str> for StepPrompt {
    fn from(prompt: &str) -> Self {
        Self::Shared(prompt.to_string())
    }
}

impl From<String> for StepPrompt {
    fn from(prompt: String) -> Self {
        Self::Shared(prompt)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for StepPrompt {
    fn from(prompts: Vec<(K, V)>) -> Self {
        Self::PerAgent(prompts.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A named node in the workflow graph
#[derive(Clone)]
pub struct WorkflowStep {
    name: String,
    agents: Vec<AgentUnit>,
    prompt: StepPrompt,
    condition: Option<WorkflowCondition>,
    parallel: bool,
    transform: Option<StepTransform>,
    next_step: Option<String>,
}

impl std::fmt::Debug for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowStep")
            .field("name", &self.name)
            .field("agents", &self.agent_ids())
            .field("prompt", &self.prompt)
            .field("condition", &self.condition)
            .field("parallel", &self.parallel)
            .field("transform", &self.transform.is_some())
            .field("next_step", &self.next_step)
            .finish()
    }
}

impl WorkflowStep {
    /// Step with a single agent.
    pub fn new(name: impl Into<String>, agent: AgentUnit, prompt: impl Into<StepPrompt>) -> Self {
        Self::group(name, vec![agent], prompt)
    }

    /// Step with several agents. Runs them sequentially unless [`parallel`](Self::parallel) is set.
    pub fn group(name: impl Into<String>, agents: Vec<AgentUnit>, prompt: impl Into<StepPrompt>) -> Self {
        Self {
            name: name.into(),
            agents,
            prompt: prompt.into(),
            condition: None,
            parallel: false,
            transform: None,
            next_step: None,
        }
    }

    /// Run the step's agents concurrently when there is more than one.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Only run the step when `condition` holds; otherwise branch to the next step.
    pub fn when(mut self, condition: WorkflowCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Derive the next input from this step's results.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&ResultMap) -> String + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Name of the step to run after this one.
    ///
    /// The link is followed whether or not the step's condition held. A run
    /// that reaches a step a second time ends there with a warning, since the
    /// links would otherwise repeat forever.
    pub fn then(mut self, next_step: impl Into<String>) -> Self {
        self.next_step = Some(next_step.into());
        self
    }

    /// Step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Agents in declaration order.
    pub fn agents(&self) -> &[AgentUnit] {
        &self.agents
    }

    /// Agent ids in declaration order.
    pub fn agent_ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.agent_id()).collect()
    }

    /// Prompt(s) for the step.
    pub fn prompt(&self) -> &StepPrompt {
        &self.prompt
    }

    /// Guard, if any.
    pub fn condition(&self) -> Option<&WorkflowCondition> {
        self.condition.as_ref()
    }

    /// Whether multiple agents run concurrently.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Name of the following step, if any.
    pub fn next_step(&self) -> Option<&str> {
        self.next_step.as_deref()
    }
}

/// One executed step in the workflow history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Step name
    pub step: String,
    /// Per-agent results of the step
    pub results: ResultMap,
    /// Input handed to the next step
    pub input: String,
}

/// Outcome of [`WorkflowOrchestrator::execute`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutput {
    /// Whether the workflow ran
    pub success: bool,
    /// Reason the workflow did not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Latest result per agent across the run
    pub results: ResultMap,
    /// Input produced by the last executed step
    pub final_output: String,
    /// Every step executed by this orchestrator, across runs
    pub execution_history: Vec<StepRecord>,
    /// Shared memory summary at the end of the run
    pub memory_summary: MemorySummary,
}

/// Shape of the step table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSummary {
    /// Step names in insertion order
    pub steps: Vec<String>,
    /// Agents across all steps
    pub total_agents: usize,
    /// Number of executed steps recorded
    pub execution_count: usize,
}

/// Runs a manually wired graph of workflow steps.
///
/// Steps run one at a time starting at the requested (or first-added) step
/// and follow `next_step` links until one does not resolve.
pub struct WorkflowOrchestrator {
    memory: SharedMemory,
    parallel: ParallelExecutor,
    steps: Vec<WorkflowStep>,
    index: HashMap<String, usize>,
    execution_history: Vec<StepRecord>,
    #[cfg(feature = "observability")]
    run_logger: Option<Arc<RunLogger>>,
}

impl WorkflowOrchestrator {
    /// Orchestrator with its own shared memory and default parallelism.
    pub fn new() -> Self {
        Self::with_memory(SharedMemory::new(), ParallelConfig::default())
    }

    /// Orchestrator on an existing shared memory.
    pub fn with_memory(memory: SharedMemory, parallel: ParallelConfig) -> Self {
        Self {
            parallel: ParallelExecutor::with_config(memory.clone(), parallel),
            memory,
            steps: Vec::new(),
            index: HashMap::new(),
            execution_history: Vec::new(),
            #[cfg(feature = "observability")]
            run_logger: None,
        }
    }

    /// Record runs into a markdown log.
    #[cfg(feature = "observability")]
    pub fn with_run_logger(mut self, logger: Arc<RunLogger>) -> Self {
        self.run_logger = Some(logger);
        self
    }

    /// Shared memory used by every step.
    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    /// Executed steps, oldest first.
    pub fn execution_history(&self) -> &[StepRecord] {
        &self.execution_history
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&WorkflowStep> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    /// Add a step and register its agents.
    ///
    /// A step with an existing name replaces the old one in place.
    pub fn add_step(&mut self, step: WorkflowStep) -> OrchestrationResult<()> {
        if step.agents.is_empty() {
            return Err(OrchestrationError::EmptyStep { step: step.name });
        }
        for agent in &step.agents {
            self.memory.register_agent(agent.agent_id());
        }
        match self.index.get(&step.name) {
            Some(&i) => self.steps[i] = step,
            None => {
                self.index.insert(step.name.clone(), self.steps.len());
                self.steps.push(step);
            }
        }
        Ok(())
    }

    /// Run the workflow.
    ///
    /// Starts at `start_step` when it names a known step, else at the first
    /// added step. Agent failures are reported through result statuses; the
    /// only unsuccessful outcome is an empty step table.
    pub async fn execute(
        &mut self,
        initial_input: &str,
        context: Option<BTreeMap<String, serde_json::Value>>,
        start_step: Option<&str>,
    ) -> WorkflowOutput {
        if self.steps.is_empty() {
            return WorkflowOutput {
                success: false,
                error: Some("No steps defined".to_string()),
                results: ResultMap::new(),
                final_output: String::new(),
                execution_history: self.execution_history.clone(),
                memory_summary: self.memory.summary(),
            };
        }

        if let Some(context) = context.filter(|c| !c.is_empty()) {
            self.memory.update_context(context);
        }

        let mut current = match start_step.and_then(|name| self.index.get(name)) {
            Some(&i) => i,
            None => 0,
        };

        info!(start = %self.steps[current].name, "starting workflow");
        self.log_start(initial_input, &self.steps[current].name);

        let mut all_results = ResultMap::new();
        let mut current_input = initial_input.to_string();

        let mut visited = HashSet::new();

        loop {
            let step = self.steps[current].clone();

            if !visited.insert(current) {
                warn!(step = %step.name, "next_step links form a cycle; ending workflow");
                break;
            }

            let guarded = step
                .condition
                .as_ref()
                .is_some_and(|condition| !condition.check(&all_results));

            if guarded {
                debug!(step = %step.name, next = ?step.next_step, "condition not met, branching");
                self.log_branch_skip(&step);
                // A pure branch: unknown targets end the run.
                match step.next_step.as_deref().and_then(|n| self.index.get(n)) {
                    Some(&next) => {
                        current = next;
                        continue;
                    }
                    None => break,
                }
            }

            let step_results = self.run_step(&step).await;
            all_results.extend(step_results.clone());

            current_input = match &step.transform {
                Some(transform) => transform(&step_results),
                None => step
                    .agents
                    .first()
                    .and_then(|agent| step_results.get(agent.agent_id()))
                    .map(AgentResult::output_text)
                    .filter(|text| !text.is_empty())
                    .unwrap_or(current_input),
            };

            self.log_step(&step.name, &step_results);
            self.execution_history.push(StepRecord {
                step: step.name.clone(),
                results: step_results,
                input: current_input.clone(),
            });

            match step.next_step.as_deref().and_then(|n| self.index.get(n)) {
                Some(&next) => current = next,
                None => break,
            }
        }

        self.log_completion(&current_input);

        WorkflowOutput {
            success: true,
            error: None,
            results: all_results,
            final_output: current_input,
            execution_history: self.execution_history.clone(),
            memory_summary: self.memory.summary(),
        }
    }

    async fn run_step(&self, step: &WorkflowStep) -> ResultMap {
        if step.parallel && step.agents.len() > 1 {
            let context = self.memory.context();
            let tasks = step
                .agents
                .iter()
                .map(|agent| {
                    ParallelTask::new(agent.clone(), step.prompt.for_agent(agent.agent_id()))
                        .with_context(context.clone())
                })
                .collect();
            debug!(step = %step.name, agents = step.agents.len(), "running step in parallel");
            return self.parallel.execute(tasks, true).await;
        }

        let mut results = ResultMap::new();
        for agent in &step.agents {
            let prompt = step.prompt.for_agent(agent.agent_id());
            let messages = self.memory.messages_for(agent.agent_id());
            let context = self.memory.context();
            let result = agent.execute(prompt, Some(&context), Some(&messages)).await;
            self.memory.store_result(result.clone());
            results.insert(agent.agent_id().to_string(), result);
        }
        results
    }

    /// Build a chain over single-agent steps, sharing this orchestrator's memory.
    ///
    /// Unknown step names are ignored.
    pub fn create_chain(&self, step_names: &[&str]) -> OrchestrationResult<AgentChain> {
        let mut chain_steps = Vec::new();

        for &name in step_names {
            let Some(step) = self.step(name) else {
                continue;
            };
            if step.agents.len() != 1 {
                return Err(OrchestrationError::MultiAgentStep {
                    step: name.to_string(),
                    agents: step.agents.len(),
                });
            }

            let agent = step.agents[0].clone();
            let prompt = step.prompt.for_agent(agent.agent_id()).to_string();

            let condition: Option<ChainCondition> = step.condition.clone().map(|condition| {
                Arc::new(move |result: &AgentResult| condition.check(&single(result)))
                    as ChainCondition
            });
            let transform: Option<ChainTransform> = step.transform.clone().map(|transform| {
                Arc::new(move |result: &AgentResult| transform(&single(result))) as ChainTransform
            });

            chain_steps.push(
                ChainStep::new(agent, prompt)
                    .named(name)
                    .with_condition(condition)
                    .with_transform(transform),
            );
        }

        Ok(AgentChain::with_memory(chain_steps, self.memory.clone()))
    }

    /// Step names, agent count and history length.
    pub fn workflow_summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            steps: self.steps.iter().map(|s| s.name.clone()).collect(),
            total_agents: self.steps.iter().map(|s| s.agents.len()).sum(),
            execution_count: self.execution_history.len(),
        }
    }

    #[cfg(feature = "observability")]
    fn log_start(&self, input: &str, start: &str) {
        if let Some(logger) = &self.run_logger {
            if let Err(e) = logger.log_workflow_start(input, start) {
                warn!(error = %e, "failed to write run log");
            }
        }
    }

    #[cfg(not(feature = "observability"))]
    fn log_start(&self, _input: &str, _start: &str) {}

    #[cfg(feature = "observability")]
    fn log_branch_skip(&self, step: &WorkflowStep) {
        if let Some(logger) = &self.run_logger {
            let description = step.condition.as_ref().and_then(|c| c.description());
            if let Err(e) = logger.log_branch_skip(&step.name, description, step.next_step.as_deref()) {
                warn!(error = %e, "failed to write run log");
            }
        }
    }

    #[cfg(not(feature = "observability"))]
    fn log_branch_skip(&self, _step: &WorkflowStep) {}

    #[cfg(feature = "observability")]
    fn log_step(&self, name: &str, results: &ResultMap) {
        if let Some(logger) = &self.run_logger {
            if let Err(e) = logger.log_step(name, results) {
                warn!(error = %e, "failed to write run log");
            }
        }
    }

    #[cfg(not(feature = "observability"))]
    fn log_step(&self, _name: &str, _results: &ResultMap) {}

    #[cfg(feature = "observability")]
    fn log_completion(&self, final_output: &str) {
        if let Some(logger) = &self.run_logger {
            if let Err(e) = logger.log_completion(final_output) {
                warn!(error = %e, "failed to write run log");
            }
        }
    }

    #[cfg(not(feature = "observability"))]
    fn log_completion(&self, _final_output: &str) {}
}

impl Default for WorkflowOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn single(result: &AgentResult) -> ResultMap {
    let mut map = ResultMap::new();
    map.insert(result.agent_id().to_string(), result.clone());
    map
}
