use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Which kind of edge a task declared when a referenced name fails to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Dependency,
    Dependee,
    Followup,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Dependency => write!(f, "Dependency"),
            ReferenceKind::Dependee => write!(f, "Dependee"),
            ReferenceKind::Followup => write!(f, "Followup"),
        }
    }
}

/// The main error type for taskr operations
///
/// Errors are cloneable: a single failure is memoized on its task, handed back
/// to every caller that reaches the task again and may also be kept as a
/// deferred error further up the tree.
#[derive(Debug, Clone, Error)]
pub enum TaskrError {
    #[error("target does not exist: {0}")]
    TargetNotFound(String),

    #[error("{kind} '{name}' for '{task}' does not exist.")]
    UnresolvedReference {
        task: String,
        kind: ReferenceKind,
        name: String,
    },

    #[error("Circular dependency detected: {0}")]
    DependencyCycle(String),

    #[error("task '{0}' was reached again while resolving its own dependencies")]
    Reentrant(String),

    #[error("command '{command}' failed with exit code {code}")]
    ExitStatus { command: String, code: i32 },

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("YAML parsing error: {0}")]
    Yaml(Arc<serde_yaml::Error>),
}

impl TaskrError {
    /// Shorthand for a plain task failure
    pub fn task(message: impl Into<String>) -> Self {
        TaskrError::Task(message.into())
    }

    /// Process exit code this error maps to.
    ///
    /// An external process failure keeps its own status, anything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskrError::ExitStatus { code, .. } => *code,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for TaskrError {
    fn from(err: std::io::Error) -> Self {
        TaskrError::Io(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for TaskrError {
    fn from(err: serde_yaml::Error) -> Self {
        TaskrError::Yaml(Arc::new(err))
    }
}

/// Exit code for an optional error, 0 when there is none
pub fn exit_code_of(err: Option<&TaskrError>) -> i32 {
    err.map_or(0, TaskrError::exit_code)
}

/// Result type alias for taskr operations
pub type TaskrResult<T> = Result<T, TaskrError>;
