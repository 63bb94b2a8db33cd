//! Lifecycle hooks and panic containment
//!
//! Global setup/teardown wrap a whole run, task setup/teardown wrap every task
//! body. Hooks and bodies run behind [`run_guarded`] so a panic turns into an
//! ordinary [`TaskrError::Panicked`] instead of unwinding through the engine.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use colored::*;
use tracing::debug;

use crate::types::{TaskrError, TaskrResult};

/// Global setup or teardown hook
pub type HookFn = Box<dyn FnMut() -> TaskrResult<()>>;

/// Per-task hook, called with the name of the task it wraps
pub type TaskHookFn = Box<dyn FnMut(&str) -> TaskrResult<()>>;

/// Process-wide lifecycle hooks of a run
#[derive(Default)]
pub struct Lifecycle {
    pub(crate) setup: Option<HookFn>,
    pub(crate) teardown: Option<HookFn>,
    pub(crate) task_setup: Option<TaskHookFn>,
    pub(crate) task_teardown: Option<TaskHookFn>,
}

impl Lifecycle {
    pub fn run_setup(&mut self) -> TaskrResult<()> {
        match self.setup.as_mut() {
            Some(hook) => run_stage("Setup", || hook()),
            None => Ok(()),
        }
    }

    pub fn run_teardown(&mut self) -> TaskrResult<()> {
        match self.teardown.as_mut() {
            Some(hook) => run_stage("Teardown", || hook()),
            None => Ok(()),
        }
    }

    pub fn run_task_setup(&mut self, task_name: &str) -> TaskrResult<()> {
        match self.task_setup.as_mut() {
            Some(hook) => run_stage("TaskSetup", || hook(task_name)),
            None => Ok(()),
        }
    }

    pub fn run_task_teardown(&mut self, task_name: &str) -> TaskrResult<()> {
        match self.task_teardown.as_mut() {
            Some(hook) => run_stage("TaskTeardown", || hook(task_name)),
            None => Ok(()),
        }
    }
}

fn run_stage<F>(stage: &str, hook: F) -> TaskrResult<()>
where
    F: FnOnce() -> TaskrResult<()>,
{
    println!("{}", stage_header(stage).bright_black());
    let result = run_guarded(hook);
    if let Err(err) = &result {
        println!("{}", format!("Error occurred: {}", err).red());
    }
    debug!(stage, ok = result.is_ok(), "lifecycle stage finished");
    result
}

pub(crate) fn stage_header(stage: &str) -> String {
    format!("--- {} {}", stage, "-".repeat(60usize.saturating_sub(5 + stage.len())))
}

/// Run `f`, converting a panic into a task failure
pub fn run_guarded<F>(f: F) -> TaskrResult<()>
where
    F: FnOnce() -> TaskrResult<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(TaskrError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
