//! Task objects and color management
//!
//! A [`Task`] is the unit of schedulable work: a name, a body and the edges that
//! tie it into the dependency and followup graph. Its runtime state lives in
//! [`TaskState`] and is mutated in place by the execution engine.

use std::time::{Duration, Instant};

use colored::Color;

use crate::context::TaskContext;
use crate::types::{exit_code_of, TaskrError, TaskrResult};

/// Body of a task
pub type TaskFn = Box<dyn FnMut(&mut TaskContext<'_>) -> TaskrResult<()>>;

/// Documentation for an argument a task understands. Only used for help output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskArgument {
    pub name: String,
    pub description: String,
    pub optional: bool,
}

/// A named timing entry recorded while a task body runs
#[derive(Debug, Clone)]
pub struct TimeMeasurement {
    pub name: String,
    pub start_time: Instant,
    pub duration: Duration,
}

/// Lifecycle of a task during one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    FailedDeferred,
    FailedIgnored,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

/// Runtime state of a task
#[derive(Debug, Default)]
pub struct TaskState {
    pub(crate) running: bool,
    pub did_run: bool,
    pub duration: Duration,
    /// The body's own live failure
    pub err: Option<TaskrError>,
    /// Failure swallowed by `continue_on_error`
    pub ignored_err: Option<TaskrError>,
    /// Failure kept back by `defer_on_error`, from the body or the subtree. The first one is kept.
    pub deferred_err: Option<TaskrError>,
    pub measurements: Vec<TimeMeasurement>,
    /// Followups added by the body while it ran
    pub added_followups: Vec<String>,
}

impl TaskState {
    pub fn status(&self) -> TaskStatus {
        if !self.did_run {
            return if self.running {
                TaskStatus::Running
            } else {
                TaskStatus::Pending
            };
        }
        if self.err.is_some() {
            TaskStatus::Failed
        } else if self.deferred_err.is_some() {
            TaskStatus::FailedDeferred
        } else if self.ignored_err.is_some() {
            TaskStatus::FailedIgnored
        } else {
            TaskStatus::Succeeded
        }
    }

    /// Exit code this run contributes: the live error first, then the deferred one
    pub fn exit_code(&self) -> i32 {
        match exit_code_of(self.err.as_ref()) {
            0 => exit_code_of(self.deferred_err.as_ref()),
            code => code,
        }
    }

    /// Whether the run carries an error that counts towards the exit code
    pub fn has_failure(&self) -> bool {
        self.err.is_some() || self.deferred_err.is_some()
    }
}

/// A registered task
pub struct Task {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) arguments: Vec<TaskArgument>,
    pub(crate) body: TaskFn,
    pub(crate) dependencies: Vec<String>,
    pub(crate) dependees: Vec<String>,
    pub(crate) followups: Vec<String>,
    pub(crate) continue_on_error: bool,
    pub(crate) defer_on_error: bool,
    pub(crate) state: TaskState,
}

impl Task {
    pub fn new(name: impl Into<String>, body: TaskFn) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            arguments: Vec::new(),
            body,
            dependencies: Vec::new(),
            dependees: Vec::new(),
            followups: Vec::new(),
            continue_on_error: false,
            defer_on_error: false,
            state: TaskState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn arguments(&self) -> &[TaskArgument] {
        &self.arguments
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn dependees(&self) -> &[String] {
        &self.dependees
    }

    pub fn followups(&self) -> &[String] {
        &self.followups
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn defer_on_error(&self) -> bool {
        self.defer_on_error
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("dependees", &self.dependees)
            .field("followups", &self.followups)
            .field("continue_on_error", &self.continue_on_error)
            .field("defer_on_error", &self.defer_on_error)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Append names to an edge list, skipping the owner itself and duplicates
pub(crate) fn append_edges<I, S>(owner: &str, list: &mut Vec<String>, names: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for name in names {
        let name = name.into();
        if name == owner || list.contains(&name) {
            continue;
        }
        list.push(name);
    }
}

/// Builder-style handle returned when a task is registered
pub struct TaskBuilder<'a> {
    task: &'a mut Task,
}

impl<'a> TaskBuilder<'a> {
    pub(crate) fn new(task: &'a mut Task) -> Self {
        Self { task }
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }

    /// Tasks that must run before this one, in the given order
    pub fn depends_on<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_edges(&self.task.name, &mut self.task.dependencies, names);
        self
    }

    /// Declare this task as a dependency of the given tasks
    pub fn dependee_of<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_edges(&self.task.name, &mut self.task.dependees, names);
        self
    }

    /// Tasks to run after this one succeeded (or deferred its error)
    pub fn then<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_edges(&self.task.name, &mut self.task.followups, names);
        self
    }

    /// Record a failure of this task without stopping the run
    pub fn continue_on_error(self) -> Self {
        self.task.continue_on_error = true;
        self
    }

    /// Keep going through dependencies and followups on failure and report at the end
    pub fn defer_on_error(self) -> Self {
        self.task.defer_on_error = true;
        self
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.task.description = description.into();
        self
    }

    pub fn argument(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        optional: bool,
    ) -> Self {
        self.task.arguments.push(TaskArgument {
            name: name.into(),
            description: description.into(),
            optional,
        });
        self
    }
}

/// Get a consistent color for a task name
pub fn get_task_color(task_name: &str) -> Color {
    // Use a simple hash of the name bytes for consistent colors
    let hash = task_name
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Jewel tones, kept away from the red/green used for errors and the summary
    let colors = [
        Color::TrueColor {
            r: 147,
            g: 112,
            b: 219,
        },
        Color::TrueColor {
            r: 64,
            g: 224,
            b: 208,
        },
        Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        },
        Color::TrueColor {
            r: 199,
            g: 21,
            b: 133,
        },
        Color::TrueColor {
            r: 72,
            g: 209,
            b: 204,
        },
        Color::TrueColor {
            r: 138,
            g: 43,
            b: 226,
        },
    ];

    colors[(hash % colors.len() as u64) as usize]
}
