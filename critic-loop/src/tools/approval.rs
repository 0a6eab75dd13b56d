//! Human approval for protected tool actions
//!
//! A tool invocation needs approval when its name maps to a protected action
//! category, or when its arguments describe a high-risk operation (a git push
//! through an otherwise harmless git tool, for example).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Categories of tool invocations that require explicit human approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProtectedAction {
    GitPush,
    FileDelete,
    ShellExec,
    Deploy,
    ExternalMessage,
    FundsTransfer,
}

impl ProtectedAction {
    pub fn label(&self) -> &'static str {
        match self {
            ProtectedAction::GitPush => "push commits to a remote repository",
            ProtectedAction::FileDelete => "delete files",
            ProtectedAction::ShellExec => "run a shell command",
            ProtectedAction::Deploy => "deploy",
            ProtectedAction::ExternalMessage => "send a message to an external service",
            ProtectedAction::FundsTransfer => "transfer funds",
        }
    }
}

static PUSH_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bgit\s+push\b|^\s*push\b").expect("static regex"));

/// Static mapping from tool name to protected category
fn static_category(tool_name: &str) -> Option<ProtectedAction> {
    match tool_name {
        "delete_file" | "remove_file" => Some(ProtectedAction::FileDelete),
        "exec" | "shell" | "run_command" => Some(ProtectedAction::ShellExec),
        "deploy" => Some(ProtectedAction::Deploy),
        "agent_send" | "twitter_post" | "send_email" => Some(ProtectedAction::ExternalMessage),
        "send_eth" | "transfer" | "broadcast_web3_tx" => Some(ProtectedAction::FundsTransfer),
        _ => None,
    }
}

/// Dynamic check on the arguments of version-control tools
fn is_push(tool_name: &str, arguments: &Value) -> bool {
    if !matches!(tool_name, "git" | "github" | "committer") {
        return false;
    }
    ["action", "operation", "command", "subcommand"]
        .iter()
        .filter_map(|key| arguments.get(*key).and_then(|v| v.as_str()))
        .any(|value| value.eq_ignore_ascii_case("push") || PUSH_COMMAND.is_match(value))
}

/// Resolve whether a tool invocation needs approval, and under which category
pub fn protected_action_for(tool_name: &str, arguments: &Value) -> Option<ProtectedAction> {
    if is_push(tool_name, arguments) {
        return Some(ProtectedAction::GitPush);
    }
    // A shell command that pushes is reported as a push, not a generic exec
    if let Some(ProtectedAction::ShellExec) = static_category(tool_name) {
        let pushes = arguments
            .get("command")
            .and_then(|v| v.as_str())
            .map(|cmd| PUSH_COMMAND.is_match(cmd))
            .unwrap_or(false);
        if pushes {
            return Some(ProtectedAction::GitPush);
        }
    }
    static_category(tool_name)
}

/// Approval gate collaborator
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request(
        &self,
        task_id: &str,
        action: ProtectedAction,
        description: &str,
        details: &Value,
    ) -> bool;
}

/// Gate used when no approval transport is configured
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn request(
        &self,
        task_id: &str,
        action: ProtectedAction,
        description: &str,
        _details: &Value,
    ) -> bool {
        log::debug!("[APPROVAL] Auto-approving {} for task {}: {}", action, task_id, description);
        true
    }
}
