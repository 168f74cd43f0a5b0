//! Sequential agent chains.
//!
//! Each step receives the chain's original input, the output carried over
//! from the previous step and the shared context, rendered into the step's
//! prompt template.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::agent::AgentUnit;
use super::memory::SharedMemory;
use super::template::{render_template, TemplateVars};
use super::types::AgentResult;

/// Predicate deciding whether a step's result advances the chain
pub type ChainCondition = Arc<dyn Fn(&AgentResult) -> bool + Send + Sync>;

/// Turns a step's result into the next step's `previous_output`
pub type ChainTransform = Arc<dyn Fn(&AgentResult) -> String + Send + Sync>;

/// A step in an [`AgentChain`]
#[derive(Clone)]
pub struct ChainStep {
    agent: AgentUnit,
    prompt_template: String,
    condition: Option<ChainCondition>,
    transform: Option<ChainTransform>,
    name: String,
}

impl std::fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStep")
            .field("name", &self.name)
            .field("agent", &self.agent.agent_id())
            .field("prompt_template", &self.prompt_template)
            .field("condition", &self.condition.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl ChainStep {
    /// Create a step. The name defaults to the agent id.
    ///
    /// The template may use `{input}`, `{previous_output}` and `{context}`.
    pub fn new(agent: AgentUnit, prompt_template: impl Into<String>) -> Self {
        let name = agent.agent_id().to_string();
        Self {
            agent,
            prompt_template: prompt_template.into(),
            condition: None,
            transform: None,
            name,
        }
    }

    /// Only advance the chain when `condition` holds for the step's result;
    /// otherwise the result is marked skipped.
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&AgentResult) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Transform the step's result before handing it to the next step.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&AgentResult) -> String + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub(crate) fn with_condition(mut self, condition: Option<ChainCondition>) -> Self {
        self.condition = condition;
        self
    }

    pub(crate) fn with_transform(mut self, transform: Option<ChainTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Set a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Agent run by this step.
    pub fn agent(&self) -> &AgentUnit {
        &self.agent
    }

    /// Unrendered prompt template.
    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Sequential chain of agents.
#[derive(Debug)]
pub struct AgentChain {
    steps: Vec<ChainStep>,
    memory: SharedMemory,
    stop_on_error: bool,
}

impl AgentChain {
    /// Create a chain with its own shared memory. Stops on the first error.
    pub fn new(steps: Vec<ChainStep>) -> Self {
        Self::with_memory(steps, SharedMemory::new())
    }

    /// Create a chain on an existing shared memory.
    pub fn with_memory(steps: Vec<ChainStep>, memory: SharedMemory) -> Self {
        for step in &steps {
            memory.register_agent(step.agent.agent_id());
        }
        Self {
            steps,
            memory,
            stop_on_error: true,
        }
    }

    /// Whether a failed step ends the run.
    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    /// Append a step.
    pub fn add_step(&mut self, step: ChainStep) {
        self.memory.register_agent(step.agent.agent_id());
        self.steps.push(step);
    }

    /// Insert a step at `position`, clamped to the chain length.
    pub fn insert_step(&mut self, position: usize, step: ChainStep) {
        self.memory.register_agent(step.agent.agent_id());
        let position = position.min(self.steps.len());
        self.steps.insert(position, step);
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    /// Shared memory the chain writes to.
    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    /// Whether a failed step ends the run.
    pub fn stops_on_error(&self) -> bool {
        self.stop_on_error
    }

    /// Run every step in order and return their results.
    ///
    /// A failed step either ends the run (`stop_on_error`) or is recorded and
    /// passed over, leaving the carried output unchanged. A step whose
    /// condition rejects its result is marked skipped and does not advance
    /// the carried output either.
    pub async fn execute(
        &self,
        input: &str,
        context: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Vec<AgentResult> {
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            self.memory.update_context(context);
        }

        let mut results = Vec::with_capacity(self.steps.len());
        let mut previous_output = input.to_string();

        for (index, step) in self.steps.iter().enumerate() {
            let agent_id = step.agent.agent_id();
            let context = self.memory.context();
            let prompt = render_template(
                &step.prompt_template,
                TemplateVars {
                    input,
                    previous_output: &previous_output,
                    context: &context,
                },
            );
            let messages = self.memory.messages_for(agent_id);

            debug!(step = %step.name, index, agent = %agent_id, "running chain step");
            let mut result = step.agent.execute(&prompt, Some(&context), Some(&messages)).await;

            if result.is_failed() {
                self.record(&mut results, result);
                if self.stop_on_error {
                    info!(step = %step.name, "chain stopped on failed step");
                    return results;
                }
                continue;
            }

            if let Some(condition) = &step.condition {
                if !condition(&result) {
                    debug!(step = %step.name, "chain step condition not met, marking skipped");
                    result = result.into_skipped();
                    self.record(&mut results, result);
                    continue;
                }
            }

            previous_output = match &step.transform {
                Some(transform) => transform(&result),
                None => result.output_text(),
            };
            self.record(&mut results, result);
        }

        results
    }

    fn record(&self, results: &mut Vec<AgentResult>, result: AgentResult) {
        self.memory.store_result(result.clone());
        results.push(result);
    }

    /// Latest stored result of the last step's agent.
    pub fn final_result(&self) -> Option<AgentResult> {
        self.steps
            .last()
            .and_then(|step| self.memory.get_result(step.agent.agent_id()))
    }
}
