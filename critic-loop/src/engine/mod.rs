//! Worker/reviewer iteration control loop

pub mod context_budget;
pub mod convergence;
pub mod error;
pub mod fallback;
pub mod feedback;
pub mod hooks;
pub mod orchestrator;
pub mod prompts;
pub mod token_ledger;
pub mod tool_loop;
pub mod types;

pub use convergence::ConvergenceDetector;
pub use error::LoopError;
pub use fallback::FallbackController;
pub use feedback::{feedback_channel, FeedbackChannel, NoFeedback};
pub use hooks::{LifecycleHooks, NoopHooks};
pub use orchestrator::IterationEngine;
pub use prompts::TaskCategory;
pub use token_ledger::{ModelUsage, TokenLedger, TokenSummary};
pub use tool_loop::{ToolLoop, ToolLoopOutcome};
pub use types::{EngineState, IterationResult, RunHistory, TaskRequest, Termination, ToolCallRecord};
