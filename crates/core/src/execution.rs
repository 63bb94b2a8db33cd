//! Task execution module
//!
//! This module handles the actual execution of tasks including lifecycle hooks,
//! dependency traversal, external command execution and execution planning.

pub mod command;
pub mod engine;
pub mod lifecycle;
pub mod plan;

pub use command::CommandExecutor;
pub use engine::Engine;
pub use lifecycle::{run_guarded, HookFn, Lifecycle, TaskHookFn};
pub use plan::{resolve_execution_plan, ExecutionPlan};
