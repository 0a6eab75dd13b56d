pub mod approval;
pub mod registry;
pub mod types;

pub use approval::{protected_action_for, ApprovalGate, AutoApprove, ProtectedAction};
pub use registry::{EmptyCatalog, Tool, ToolCatalog, ToolRegistry};
pub use types::{PropertySchema, ToolDefinition, ToolInputSchema, ToolResult};
