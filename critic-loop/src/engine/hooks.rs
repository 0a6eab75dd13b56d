//! Lifecycle hooks around iterations and tool calls

use crate::ai::Message;
use crate::tools::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// Optional interception points. Every method defaults to passing its input
/// through unchanged, so implementors override only what they need.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_iteration(&self, transcript: Vec<Message>, _iteration: u32) -> Vec<Message> {
        transcript
    }

    async fn after_iteration(&self, output: String, _iteration: u32) -> String {
        output
    }

    async fn before_tool_call(&self, _tool_name: &str, arguments: Value) -> Value {
        arguments
    }

    async fn after_tool_call(&self, _tool_name: &str, result: ToolResult) -> ToolResult {
        result
    }
}

pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}
