//! Tool catalog collaborator and an in-memory registry implementing it

use super::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The set of tools a worker can call.
///
/// `all_schemas` is re-read before every tool round, so implementations may
/// grow while a task is running.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    fn all_schemas(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, tool_name: &str, caller_id: &str, arguments: Value) -> ToolResult;
}

/// Catalog with no tools; the engine falls back to text-only generation
pub struct EmptyCatalog;

#[async_trait]
impl ToolCatalog for EmptyCatalog {
    fn all_schemas(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn execute(&self, tool_name: &str, _caller_id: &str, _arguments: Value) -> ToolResult {
        ToolResult::error(format!("Tool '{}' is not available", tool_name))
    }
}

/// A single executable tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, params: Value, caller_id: &str) -> ToolResult;
}

/// Registry of tools keyed by name.
///
/// Registration takes `&self` so tools can be added through a shared handle
/// while a run is in flight.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    deny_list: RwLock<HashSet<String>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        log::debug!("[TOOLS] Registered '{}'", name);
        self.tools.write().insert(name, tool);
    }

    /// Hide a tool from schemas and refuse to execute it
    pub fn deny(&self, tool_name: &str) {
        self.deny_list.write().insert(tool_name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if self.deny_list.read().contains(name) {
            return None;
        }
        self.tools.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

#[async_trait]
impl ToolCatalog for ToolRegistry {
    fn all_schemas(&self) -> Vec<ToolDefinition> {
        let denied = self.deny_list.read();
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .read()
            .values()
            .map(|tool| tool.definition())
            .filter(|def| !denied.contains(&def.name))
            .collect();
        // Stable order keeps prompts deterministic across rounds
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    async fn execute(&self, tool_name: &str, caller_id: &str, arguments: Value) -> ToolResult {
        match self.get(tool_name) {
            Some(tool) => tool.execute(arguments, caller_id).await,
            None => ToolResult::error(format!("Unknown or disabled tool: {}", tool_name)),
        }
    }
}
