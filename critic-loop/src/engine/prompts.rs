//! Worker and reviewer prompts

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_WORKER_PROMPT: &str = include_str!("prompts/worker.md");

/// Task categories with a dedicated reviewer prompt
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskCategory {
    Code,
    Research,
    Writing,
    Analysis,
    Data,
    #[default]
    General,
}

impl TaskCategory {
    /// Parse a free-form label; anything unrecognized is `General`
    pub fn from_label(label: &str) -> Self {
        TaskCategory::from_str(label.trim()).unwrap_or_default()
    }

    pub fn reviewer_prompt(&self) -> &'static str {
        match self {
            TaskCategory::Code => include_str!("prompts/review_code.md"),
            TaskCategory::Research => include_str!("prompts/review_research.md"),
            TaskCategory::Writing => include_str!("prompts/review_writing.md"),
            TaskCategory::Analysis => include_str!("prompts/review_analysis.md"),
            TaskCategory::Data => include_str!("prompts/review_data.md"),
            TaskCategory::General => include_str!("prompts/review_general.md"),
        }
    }
}

/// Reviewer user turn: the task and the worker output under review
pub fn review_request(task: &str, output: &str, tool_summary: Option<&str>) -> String {
    let mut request = format!("## Task\n\n{}\n\n## Answer under review\n\n{}\n", task, output);
    if let Some(summary) = tool_summary {
        request.push_str("\n## Tools the worker used\n\n");
        request.push_str(summary);
        request.push('\n');
    }
    request
}

/// Worker user turn carrying reviewer feedback
pub fn revision_request(feedback: &str) -> String {
    format!(
        "A reviewer checked your answer and requested changes:\n\n{}\n\n\
         Produce a complete revised answer that addresses every point.",
        feedback.trim()
    )
}

/// Worker user turn carrying operator feedback injected mid-task
pub fn operator_feedback(message: &str) -> String {
    format!(
        "[Operator feedback, takes priority over earlier instructions]\n\n{}",
        message.trim()
    )
}

/// Final-round prompt when the tool round cap is hit
pub const TOOL_CAP_PROMPT: &str = "You have reached the tool-call limit for this step. \
Do not call any more tools. Answer the task now using only the information gathered so far.";

/// Approval iff the first non-blank line starts with `APPROVED`, case-insensitively.
///
/// Any such line counts, whatever follows it: "Approved by nobody yet" parses
/// as approval. Reviewer prompts ask for the token on the first line only.
pub fn is_approved(review: &str) -> bool {
    review
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| {
            line.get(..8)
                .map(|head| head.eq_ignore_ascii_case("approved"))
                .unwrap_or(false)
        })
        .unwrap_or(false)
}
