pub mod ai;
pub mod config;
pub mod engine;
pub mod providers;
pub mod routing;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use config::{LoopConfig, OverflowStrategy};
pub use engine::{IterationEngine, LoopError, RunHistory, TaskRequest, Termination};
