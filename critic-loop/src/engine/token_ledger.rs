use crate::ai::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub calls: u64,
}

/// Plain token summary attached to a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub by_model: BTreeMap<String, ModelUsage>,
}

/// Running token totals for one task run.
///
/// Only the fallback controller writes to it, once per successful completion,
/// so per-model call counts always equal successful completions for that key.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    prompt_tokens: u64,
    completion_tokens: u64,
    by_model: BTreeMap<String, ModelUsage>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful completion served by `model_key`.
    /// A missing usage block still counts the call.
    pub fn record(&mut self, model_key: &str, usage: Option<&TokenUsage>) {
        let (prompt, completion) = usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        self.prompt_tokens += prompt;
        self.completion_tokens += completion;

        let entry = self.by_model.entry(model_key.to_string()).or_default();
        entry.prompt_tokens += prompt;
        entry.completion_tokens += completion;
        entry.calls += 1;
    }

    pub fn calls_for(&self, model_key: &str) -> u64 {
        self.by_model.get(model_key).map(|u| u.calls).unwrap_or(0)
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn summary(&self) -> TokenSummary {
        TokenSummary {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens(),
            by_model: self.by_model.clone(),
        }
    }
}
