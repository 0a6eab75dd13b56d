//! Scripted collaborators shared by unit tests

use crate::ai::{
    Completion, Message, ModelError, ModelReply, ModelService, TokenUsage, ToolCall, ToolCompletion,
};
use crate::engine::LifecycleHooks;
use crate::tools::{ApprovalGate, ProtectedAction, Tool, ToolDefinition, ToolRegistry, ToolResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What a scripted model does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Reply(ModelReply),
    Fail(ModelError),
    /// Never completes; used for cancellation and time-out tests
    Hang,
}

pub fn text(content: &str) -> Step {
    Step::Reply(ModelReply::Text(content.to_string()))
}

pub fn tool_calls(calls: Vec<ToolCall>) -> Step {
    Step::Reply(ModelReply::ToolInvocations {
        content: String::new(),
        calls,
    })
}

pub fn fail(err: ModelError) -> Step {
    Step::Fail(err)
}

pub fn rate_limited(model: &str) -> Step {
    fail(ModelError::RateLimited {
        model: model.to_string(),
        message: "HTTP 429: slow down".to_string(),
    })
}

pub fn unauthorized(model: &str) -> Step {
    fail(ModelError::Unauthorized {
        model: model.to_string(),
        message: "HTTP 401: invalid api key".to_string(),
    })
}

pub fn transient(model: &str) -> Step {
    fail(ModelError::Transient {
        model: model.to_string(),
        message: "HTTP 502: bad gateway".to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub with_tools: bool,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Mode {
    Any,
    WithTools,
    TextOnly,
}

/// Model service that replays per-model scripts.
///
/// Queued steps are consumed first, then the mode-specific sticky step, then
/// the sticky step for any mode. A model with nothing scripted is unavailable.
#[derive(Default)]
pub struct ScriptedService {
    queues: Mutex<HashMap<String, VecDeque<Step>>>,
    sticky: Mutex<HashMap<(String, Mode), Step>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, model: &str, step: Step) -> Self {
        self.queues
            .lock()
            .entry(model.to_string())
            .or_default()
            .push_back(step);
        self
    }

    pub fn always(self, model: &str, step: Step) -> Self {
        self.sticky.lock().insert((model.to_string(), Mode::Any), step);
        self
    }

    pub fn always_with_tools(self, model: &str, step: Step) -> Self {
        self.sticky.lock().insert((model.to_string(), Mode::WithTools), step);
        self
    }

    pub fn always_text_only(self, model: &str, step: Step) -> Self {
        self.sticky.lock().insert((model.to_string(), Mode::TextOnly), step);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, model: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.model == model).count()
    }

    fn next_step(&self, model: &str, mode: Mode) -> Step {
        if let Some(step) = self.queues.lock().get_mut(model).and_then(VecDeque::pop_front) {
            return step;
        }
        let sticky = self.sticky.lock();
        sticky
            .get(&(model.to_string(), mode))
            .or_else(|| sticky.get(&(model.to_string(), Mode::Any)))
            .cloned()
            .unwrap_or_else(|| {
                Step::Fail(ModelError::Unavailable {
                    model: model.to_string(),
                    message: "not scripted".to_string(),
                })
            })
    }

    async fn respond(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<(ModelReply, TokenUsage), ModelError> {
        self.calls.lock().push(RecordedCall {
            model: model.to_string(),
            with_tools: tools.is_some(),
            messages: messages.to_vec(),
            tool_names: tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.name.clone())
                .collect(),
        });

        let mode = if tools.is_some() { Mode::WithTools } else { Mode::TextOnly };
        match self.next_step(model, mode) {
            Step::Reply(reply) => Ok((
                reply,
                TokenUsage {
                    model_key: model.to_string(),
                    prompt_tokens: 10,
                    completion_tokens: 5,
                },
            )),
            Step::Fail(err) => Err(err),
            Step::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ModelService for ScriptedService {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<Completion, ModelError> {
        let (reply, usage) = self.respond(model, messages, None).await?;
        let text = match reply {
            ModelReply::Text(text) => text,
            ModelReply::ToolInvocations { content, .. } => content,
        };
        Ok(Completion {
            text,
            usage: Some(usage),
        })
    }

    async fn complete_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ToolCompletion, ModelError> {
        let (reply, usage) = self.respond(model, messages, Some(tools)).await?;
        Ok(ToolCompletion {
            reply,
            usage: Some(usage),
        })
    }
}

/// Tool that echoes its arguments and counts executions
pub struct EchoTool {
    name: String,
    executions: AtomicUsize,
}

impl EchoTool {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, "Echo the given text back")
    }

    async fn execute(&self, params: Value, _caller_id: &str) -> ToolResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| params.to_string());
        ToolResult::success(format!("echo: {}", text))
    }
}

/// Tool that registers another tool when executed
pub struct RegisteringTool {
    name: String,
    registry: Arc<ToolRegistry>,
    adds: String,
}

impl RegisteringTool {
    pub fn new(name: &str, registry: Arc<ToolRegistry>, adds: &str) -> Self {
        Self {
            name: name.to_string(),
            registry,
            adds: adds.to_string(),
        }
    }
}

#[async_trait]
impl Tool for RegisteringTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, "Install another tool")
    }

    async fn execute(&self, _params: Value, _caller_id: &str) -> ToolResult {
        self.registry.register(Arc::new(EchoTool::named(&self.adds)));
        ToolResult::success(format!("installed {}", self.adds))
    }
}

/// Approval gate that answers every request the same way and records it
pub struct RecordingGate {
    approve: bool,
    requests: Mutex<Vec<(ProtectedAction, String)>>,
}

impl RecordingGate {
    pub fn approving() -> Self {
        Self {
            approve: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            approve: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(ProtectedAction, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ApprovalGate for RecordingGate {
    async fn request(
        &self,
        _task_id: &str,
        action: ProtectedAction,
        description: &str,
        _details: &Value,
    ) -> bool {
        self.requests.lock().push((action, description.to_string()));
        self.approve
    }
}

/// Tool whose execution never finishes
pub struct HangingTool {
    name: String,
}

impl HangingTool {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for HangingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, "Wait on a resource that never answers")
    }

    async fn execute(&self, _params: Value, _caller_id: &str) -> ToolResult {
        std::future::pending().await
    }
}

/// Approval gate that never answers
pub struct SilentGate;

#[async_trait]
impl ApprovalGate for SilentGate {
    async fn request(
        &self,
        _task_id: &str,
        _action: ProtectedAction,
        _description: &str,
        _details: &Value,
    ) -> bool {
        std::future::pending().await
    }
}

/// Hooks that leave a visible mark at every interception point
pub struct RewritingHooks;

#[async_trait]
impl LifecycleHooks for RewritingHooks {
    async fn before_iteration(&self, mut transcript: Vec<Message>, iteration: u32) -> Vec<Message> {
        transcript.push(Message::user(format!("hook note {}", iteration)));
        transcript
    }

    async fn after_iteration(&self, output: String, _iteration: u32) -> String {
        format!("edited: {}", output)
    }

    async fn before_tool_call(&self, _tool_name: &str, _arguments: Value) -> Value {
        json!({"text": "rewritten"})
    }

    async fn after_tool_call(&self, _tool_name: &str, result: ToolResult) -> ToolResult {
        ToolResult {
            content: format!("{} [checked]", result.content),
            ..result
        }
    }
}
