use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments exactly as the model produced them
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the arguments. Empty strings are treated as `{}` since several
    /// providers omit arguments for parameterless tools.
    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Decoded model reply: either a final text answer or a batch of tool invocations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolInvocations {
        /// Any text the model emitted alongside the calls
        content: String,
        calls: Vec<ToolCall>,
    },
}

impl ModelReply {
    /// Build a reply from a raw choice, collapsing an empty call list to text
    pub fn from_parts(content: String, calls: Vec<ToolCall>) -> Self {
        if calls.is_empty() {
            ModelReply::Text(content)
        } else {
            ModelReply::ToolInvocations { content, calls }
        }
    }
}

/// Token usage reported by a provider for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Model that actually served the request
    pub model_key: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone)]
pub struct ToolCompletion {
    pub reply: ModelReply,
    pub usage: Option<TokenUsage>,
}
