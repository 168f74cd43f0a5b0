//! Markdown run log for workflow executions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::orchestration::{AgentResult, AgentStatus, ResultMap};

/// Longest output excerpt written at `DEBUG` level, in chars
const OUTPUT_EXCERPT_CHARS: usize = 500;

/// Appends a markdown record of workflow runs to a file.
///
/// Each call opens the file in append mode, so one logger can be shared
/// between orchestrators behind an `Arc`.
#[derive(Debug)]
pub struct RunLogger {
    log_file: PathBuf,
    log_level: String,
}

impl RunLogger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO"). `DEBUG` adds agent output excerpts.
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => std::env::temp_dir().join("agent-ensemble").join(format!(
                "run_{}_{}.md",
                Utc::now().timestamp_millis(),
                std::process::id()
            )),
        };

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level: log_level.unwrap_or("INFO").to_uppercase(),
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        writeln!(file, "# Agent Ensemble Run Log\n")?;
        writeln!(file, "Log started: {}\n", Utc::now().to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    fn is_debug(&self) -> bool {
        self.log_level == "DEBUG"
    }

    /// Log the start of a workflow run.
    pub fn log_workflow_start(&self, input: &str, start_step: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Workflow Started - {}\n\n**Start step:** {}\n**Input:**\n```\n{}\n```\n\n",
            now.to_rfc3339(),
            start_step,
            input
        );
        self.append_to_log(&content)
    }

    /// Log an executed step with one line per agent.
    pub fn log_step(&self, step: &str, results: &ResultMap) -> Result<()> {
        let mut content = format!("### Step: {}\n\n", step);

        for (agent_id, result) in results {
            content.push_str(&format!(
                "- `{}`: {} ({:.3}s)\n",
                agent_id,
                result.status(),
                result.duration().as_secs_f64()
            ));
            if self.is_debug() && result.is_completed() {
                content.push_str(&format!("\n```\n{}\n```\n\n", excerpt(&result.output_text())));
            }
        }
        content.push('\n');
        self.append_to_log(&content)?;

        for result in results.values().filter(|r| r.status() == AgentStatus::Failed) {
            self.log_agent_failure(result)?;
        }
        Ok(())
    }

    /// Log a step whose condition did not hold.
    pub fn log_branch_skip(&self, step: &str, condition: Option<&str>, next_step: Option<&str>) -> Result<()> {
        let content = format!(
            "### Step Skipped: {}\n\n**Condition:** {}\n**Next:** {}\n\n",
            step,
            condition.unwrap_or("(undescribed)"),
            next_step.unwrap_or("(end)")
        );
        self.append_to_log(&content)
    }

    /// Log a failed agent result.
    pub fn log_agent_failure(&self, result: &AgentResult) -> Result<()> {
        let content = format!(
            "**Agent failed:** `{}`\n\n```\n{}\n```\n\n",
            result.agent_id(),
            result.error().unwrap_or("unknown error")
        );
        self.append_to_log(&content)
    }

    /// Log the end of a workflow run.
    pub fn log_completion(&self, final_output: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Workflow Completed - {}\n\n**Final output:**\n```\n{}\n```\n\n---\n\n",
            now.to_rfc3339(),
            excerpt(final_output)
        );
        self.append_to_log(&content)
    }

    /// Get log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(OUTPUT_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
