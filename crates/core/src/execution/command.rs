//! Command execution utilities
//!
//! This module provides a unified interface for executing different types of commands
//! (shell commands, scripts, executable with args) from task bodies. A process that
//! exits non-zero becomes [`TaskrError::ExitStatus`] so its code survives up to the
//! process exit code of the run.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::types::{TaskrError, TaskrResult};

/// Unified command executor that handles common setup and execution patterns
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    working_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands inside the given directory instead of the current one
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Execute a command with common setup and error handling
    pub fn execute_command(&self, command: &mut Command, command_line: &str) -> TaskrResult<()> {
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        debug!(command = command_line, dir = ?self.working_dir, "executing command");

        let status = command.status()?;

        if !status.success() {
            // A process killed by a signal has no code of its own
            return Err(TaskrError::ExitStatus {
                command: command_line.to_string(),
                code: status.code().unwrap_or(1),
            });
        }

        Ok(())
    }

    /// Execute a script file. Relative paths resolve against the working directory.
    pub fn execute_script(&self, script_path: &str) -> TaskrResult<()> {
        let full_script_path = self.resolve(Path::new(script_path));

        if !full_script_path.exists() {
            return Err(TaskrError::task(format!(
                "Script file '{}' not found",
                full_script_path.display()
            )));
        }

        let mut command = Command::new(&full_script_path);
        self.execute_command(&mut command, &full_script_path.display().to_string())
    }

    /// Execute a command with arguments
    pub fn execute_command_with_args(&self, program: &str, args: &[String]) -> TaskrResult<()> {
        let mut command = Command::new(program);
        command.args(args);
        let command_line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        self.execute_command(&mut command, &command_line)
    }

    /// Execute a single shell command
    pub fn execute_shell_command(&self, cmd: &str) -> TaskrResult<()> {
        let mut command = shell();
        command.arg(cmd);
        self.execute_command(&mut command, cmd)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(not(windows))]
fn shell() -> Command {
    let mut command = Command::new("sh");
    command.arg("-c");
    command
}

#[cfg(windows)]
fn shell() -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C");
    command
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_shell_exit_code_is_kept() {
        let err = CommandExecutor::new()
            .execute_shell_command("exit 10")
            .expect_err("non-zero exit");
        assert_eq!(err.exit_code(), 10);
        assert!(matches!(err, TaskrError::ExitStatus { code: 10, .. }));
    }

    #[test]
    fn test_successful_command() {
        assert!(CommandExecutor::new().execute_shell_command("true").is_ok());
        assert!(CommandExecutor::new()
            .execute_command_with_args("sh", &["-c".to_string(), "exit 0".to_string()])
            .is_ok());
    }

    #[test]
    fn test_working_dir_and_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let executor = CommandExecutor::new()
            .working_dir(temp_dir.path())
            .env("TASKR_TEST_VALUE", "foo");

        executor
            .execute_shell_command("printf '%s' \"$TASKR_TEST_VALUE\" > out.txt")
            .unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "foo");
    }

    #[test]
    fn test_missing_script_is_a_task_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = CommandExecutor::new()
            .working_dir(temp_dir.path())
            .execute_script("nope.sh")
            .expect_err("missing script");
        assert!(err.to_string().contains("not found"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let err = CommandExecutor::new()
            .execute_command_with_args("taskr-definitely-not-a-program", &[])
            .expect_err("spawn failure");
        assert!(matches!(err, TaskrError::Io(_)));
    }
}
