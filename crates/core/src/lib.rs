//! Taskr Core Library
//!
//! This is the core library for the taskr task runner. A program registers named
//! tasks, wires them into dependency and followup graphs and runs a requested
//! target while taskr tracks timing, errors and lifecycle hooks.
//!
//! ## Architecture
//!
//! - [`args`] - Argument store resolved from the invocation arguments
//! - [`tasks`] - Task objects, their builder and runtime state
//! - [`registry`] - Task registry and dependency graph construction
//! - [`context`] - Per-invocation context handed to task bodies
//! - [`execution`] - Execution engine, lifecycle hooks, command execution and planning
//! - [`results`] - Run report with durations, exit codes and sub-measurements
//! - [`configs`] - Declarative task files
//! - [`logging`] - Diagnostic logging setup
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taskr_core::{CommandExecutor, Engine};
//!
//! let mut engine = Engine::from_env();
//!
//! engine
//!     .task("Build", |ctx| {
//!         ctx.measure_time("compile", || {
//!             CommandExecutor::new().execute_shell_command("cargo build")
//!         })
//!     })
//!     .description("Compile the workspace")
//!     .then(["Test"]);
//! engine.task("Test", |_| CommandExecutor::new().execute_shell_command("cargo test"));
//!
//! std::process::exit(engine.execute());
//! ```

pub mod args;
pub mod configs;
pub mod context;
pub mod execution;
pub mod logging;
pub mod registry;
pub mod results;
pub mod tasks;
pub mod types;

// Re-export the main types for easier usage
pub use args::Arguments;
pub use context::{MeasurementHandle, TaskContext};
pub use execution::{CommandExecutor, Engine, ExecutionPlan};
pub use registry::{Registry, TaskGraph};
pub use results::{RunEntry, RunReport};
pub use tasks::{Task, TaskBuilder, TaskStatus};
pub use types::{TaskrError, TaskrResult};
