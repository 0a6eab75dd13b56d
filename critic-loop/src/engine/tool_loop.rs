//! Bounded multi-round tool calling for one worker generation

use super::error::LoopError;
use super::fallback::FallbackController;
use super::hooks::LifecycleHooks;
use super::prompts::TOOL_CAP_PROMPT;
use super::types::ToolCallRecord;
use crate::ai::{Message, ModelReply, ToolCall};
use crate::tools::{protected_action_for, ApprovalGate, ToolCatalog, ToolResult};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Final answer of a tool loop plus every tool call made on the way
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    pub output: String,
    pub records: Vec<ToolCallRecord>,
    pub rounds: usize,
}

/// Borrowed view of the engine's collaborators for one generation
pub struct ToolLoop<'a> {
    pub controller: &'a mut FallbackController,
    pub catalog: &'a dyn ToolCatalog,
    pub gate: &'a dyn ApprovalGate,
    pub hooks: &'a dyn LifecycleHooks,
    pub cancel: &'a CancellationToken,
    pub task_id: &'a str,
    pub max_rounds: usize,
    pub tool_timeout: Duration,
    pub approval_timeout: Duration,
}

impl ToolLoop<'_> {
    /// Run tool rounds on `working` until the model answers in text or the
    /// round cap forces a final text-only call.
    ///
    /// Each round appends the assistant turn that requested tools, then one
    /// tool-result turn per call in the order the calls were issued.
    pub async fn run(
        &mut self,
        model: &str,
        working: &mut Vec<Message>,
    ) -> Result<ToolLoopOutcome, LoopError> {
        let mut records = Vec::new();

        for round in 1..=self.max_rounds {
            let tools = self.catalog.all_schemas();
            if tools.is_empty() {
                log::debug!("[TOOL_LOOP] No tools available in round {}, answering in text", round);
                let output = self.controller.complete(model, working.as_slice()).await?;
                return Ok(ToolLoopOutcome { output, records, rounds: round });
            }

            log::info!(
                "[TOOL_LOOP] Round {}/{} for task {} with {} tools",
                round,
                self.max_rounds,
                self.task_id,
                tools.len()
            );

            match self
                .controller
                .complete_with_tools(model, working.as_slice(), &tools)
                .await?
            {
                ModelReply::Text(output) => {
                    log::info!(
                        "[TOOL_LOOP] Final answer after {} round(s), {} tool call(s)",
                        round,
                        records.len()
                    );
                    return Ok(ToolLoopOutcome { output, records, rounds: round });
                }
                ModelReply::ToolInvocations { content, calls } => {
                    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                    log::info!("[TOOL_LOOP] Model requested: {}", names.join(", "));

                    working.push(Message::assistant_tool_calls(content, calls.clone()));
                    for call in &calls {
                        let record = self.invoke(call).await?;
                        working.push(Message::tool_result(&record.call_id, &record.result));
                        records.push(record);
                    }
                }
            }
        }

        log::warn!(
            "[TOOL_LOOP] Hit the {}-round cap for task {}, requesting a final answer",
            self.max_rounds,
            self.task_id
        );
        working.push(Message::user(TOOL_CAP_PROMPT));
        let output = self.controller.complete(model, working.as_slice()).await?;
        Ok(ToolLoopOutcome {
            output,
            records,
            rounds: self.max_rounds,
        })
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolCallRecord, LoopError> {
        let arguments = match call.parsed_arguments() {
            Ok(arguments) => arguments,
            Err(e) => {
                log::warn!("[TOOL_LOOP] Malformed arguments for '{}': {}", call.name, e);
                return Ok(failed_record(
                    call,
                    Value::String(call.arguments.clone()),
                    format!("Invalid arguments for '{}': {}", call.name, e),
                ));
            }
        };

        if let Some(action) = protected_action_for(&call.name, &arguments) {
            let description = format!("{} via '{}'", action.label(), call.name);
            log::info!("[APPROVAL] Requesting approval for {} (task {})", description, self.task_id);

            let approved = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(LoopError::Cancelled),
                decision = tokio::time::timeout(
                    self.approval_timeout,
                    self.gate.request(self.task_id, action, &description, &arguments),
                ) => decision.unwrap_or_else(|_| {
                    log::warn!("[APPROVAL] No decision for {} within {:?}, denying", description, self.approval_timeout);
                    false
                }),
            };

            if !approved {
                log::warn!("[APPROVAL] Denied {} for task {}", description, self.task_id);
                return Ok(failed_record(
                    call,
                    arguments,
                    format!("Denied: {} was not approved", action.label()),
                ));
            }
        }

        let arguments = self.hooks.before_tool_call(&call.name, arguments).await;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(LoopError::Cancelled),
            outcome = tokio::time::timeout(
                self.tool_timeout,
                self.catalog.execute(&call.name, self.task_id, arguments.clone()),
            ) => outcome.unwrap_or_else(|_| {
                ToolResult::error(format!("Tool '{}' timed out after {:?}", call.name, self.tool_timeout))
            }),
        };
        let result = self.hooks.after_tool_call(&call.name, result).await;

        if result.success {
            log::debug!("[TOOL_LOOP] '{}' ok ({} chars)", call.name, result.content.len());
        } else {
            log::warn!("[TOOL_LOOP] '{}' failed: {}", call.name, result.content);
        }

        Ok(ToolCallRecord {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments,
            result: result.content,
            success: result.success,
        })
    }
}

fn failed_record(call: &ToolCall, arguments: Value, message: String) -> ToolCallRecord {
    ToolCallRecord {
        call_id: call.id.clone(),
        tool_name: call.name.clone(),
        arguments,
        result: message,
        success: false,
    }
}
