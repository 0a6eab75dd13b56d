//! Iteration engine types

use super::prompts::TaskCategory;
use super::token_ledger::TokenSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Where the engine is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Generating,
    Reviewing,
    Approved,
    MaxIterationsReached,
    ContextOverflowAborted,
    Cancelled,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    Approved,
    MaxIterationsReached,
    ContextOverflowAborted,
    Cancelled,
}

impl From<Termination> for EngineState {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::Approved => EngineState::Approved,
            Termination::MaxIterationsReached => EngineState::MaxIterationsReached,
            Termination::ContextOverflowAborted => EngineState::ContextOverflowAborted,
            Termination::Cancelled => EngineState::Cancelled,
        }
    }
}

/// One tool invocation and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub result: String,
    pub success: bool,
}

impl ToolCallRecord {
    /// One-line summary for reviewer prompts
    pub fn summary_line(&self) -> String {
        format!(
            "- {} {} ({})",
            self.tool_name,
            self.arguments,
            if self.success { "ok" } else { "failed" }
        )
    }
}

/// One completed iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationResult {
    /// 1-based, strictly increasing by one
    pub iteration: u32,
    pub output: String,
    /// Empty when no reviewer is configured
    pub feedback: String,
    pub approved: bool,
    /// Approval was forced because feedback stopped changing
    pub converged: bool,
    pub tool_calls: Vec<ToolCallRecord>,
    pub completed_at: DateTime<Utc>,
}

/// Input to a single run
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task_id: String,
    pub description: String,
    pub worker_model: String,
    pub reviewer_model: Option<String>,
    pub max_iterations: Option<u32>,
    pub system_prompt: Option<String>,
    pub category: TaskCategory,
}

impl TaskRequest {
    pub fn new(description: impl Into<String>, worker_model: impl Into<String>) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            description: description.into(),
            worker_model: worker_model.into(),
            reviewer_model: None,
            max_iterations: None,
            system_prompt: None,
            category: TaskCategory::General,
        }
    }

    pub fn with_reviewer(mut self, model: impl Into<String>) -> Self {
        self.reviewer_model = Some(model.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    pub task_id: String,
    pub iterations: Vec<IterationResult>,
    pub final_output: String,
    pub total_iterations: u32,
    pub termination: Option<Termination>,
    pub token_usage: TokenSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunHistory {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            iterations: Vec::new(),
            final_output: String::new(),
            total_iterations: 0,
            termination: None,
            token_usage: TokenSummary::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn push(&mut self, result: IterationResult) {
        debug_assert_eq!(result.iteration as usize, self.iterations.len() + 1);
        self.iterations.push(result);
    }

    pub fn last_feedback(&self) -> Option<&str> {
        self.iterations.last().map(|r| r.feedback.as_str())
    }

    pub fn finish(&mut self, termination: Termination, token_usage: TokenSummary) {
        self.termination = Some(termination);
        self.token_usage = token_usage;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_approved(&self) -> bool {
        self.termination == Some(Termination::Approved)
    }
}
