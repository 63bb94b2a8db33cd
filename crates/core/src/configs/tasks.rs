use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::execution::command::CommandExecutor;
use crate::execution::engine::Engine;
use crate::types::{TaskrError, TaskrResult};

/// Default file name of a task file
pub const DEFAULT_TASKS_FILE: &str = "taskr.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    /// A command line run through the shell
    Single(String),
    /// A program followed by its arguments, run without a shell
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArgumentConfig {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    pub script: Option<String>,
    pub command: Option<Command>,
    /// Directory the command runs in, relative to the task file
    pub working_dir: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
    pub dependencies: Option<Vec<String>>,
    pub dependees: Option<Vec<String>>,
    pub followups: Option<Vec<String>>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub defer_on_error: bool,
    pub arguments: Option<Vec<ArgumentConfig>>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TasksFileConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub setup: Option<Command>,
    pub teardown: Option<Command>,
    pub task_setup: Option<Command>,
    pub task_teardown: Option<Command>,
    pub tasks: Vec<TaskConfig>,
}

pub fn parse_tasks_config(yaml_str: &str) -> TaskrResult<TasksFileConfig> {
    let config: TasksFileConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// Read and parse a task file
pub fn load_tasks_file(path: &Path) -> TaskrResult<TasksFileConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        TaskrError::Config(format!("Failed to read task file {}: {}", path.display(), e))
    })?;
    parse_tasks_config(&content)
}

/// JSON schema of the task file
pub fn tasks_file_schema() -> schemars::Schema {
    schemars::schema_for!(TasksFileConfig)
}

/// What a configured task does when it runs
#[derive(Debug, Clone)]
enum TaskAction {
    Noop,
    Command(Command),
    Script(String),
}

impl TaskAction {
    fn from_config(task: &TaskConfig) -> TaskrResult<Self> {
        match (&task.command, &task.script) {
            (Some(_), Some(_)) => Err(TaskrError::Config(format!(
                "Task '{}' has both a script and a command",
                task.name
            ))),
            (Some(command), None) => Ok(TaskAction::Command(command.clone())),
            (None, Some(script)) => Ok(TaskAction::Script(script.clone())),
            (None, None) => Ok(TaskAction::Noop),
        }
    }

    fn run(&self, executor: &CommandExecutor) -> TaskrResult<()> {
        match self {
            TaskAction::Noop => Ok(()),
            TaskAction::Command(command) => run_command(executor, command),
            TaskAction::Script(script) => executor.execute_script(script),
        }
    }
}

fn run_command(executor: &CommandExecutor, command: &Command) -> TaskrResult<()> {
    match command {
        Command::Single(cmd) => executor.execute_shell_command(cmd),
        Command::Multiple(cmds) => match cmds.split_first() {
            Some((program, args)) => executor.execute_command_with_args(program, args),
            None => Ok(()),
        },
    }
}

impl TasksFileConfig {
    /// Register every task and lifecycle hook of the file with `engine`.
    ///
    /// Relative working directories and scripts resolve against `base_dir`,
    /// normally the directory holding the file.
    pub fn register(&self, engine: &mut Engine, base_dir: &Path) -> TaskrResult<()> {
        let base_executor = CommandExecutor::new().working_dir(base_dir);

        for task in &self.tasks {
            let action = TaskAction::from_config(task)?;
            let working_dir = task
                .working_dir
                .as_deref()
                .map_or_else(|| base_dir.to_path_buf(), |dir| base_dir.join(dir));
            let executor = task_executor(working_dir, task.env.as_ref());

            let builder = engine
                .task(task.name.clone(), move |_| action.run(&executor))
                .description(task.description.clone().unwrap_or_default())
                .depends_on(task.dependencies.clone().unwrap_or_default())
                .dependee_of(task.dependees.clone().unwrap_or_default())
                .then(task.followups.clone().unwrap_or_default());
            let builder = task.arguments.iter().flatten().fold(builder, |builder, argument| {
                builder.argument(
                    argument.name.clone(),
                    argument.description.clone().unwrap_or_default(),
                    argument.optional,
                )
            });
            let builder = if task.continue_on_error {
                builder.continue_on_error()
            } else {
                builder
            };
            if task.defer_on_error {
                builder.defer_on_error();
            }
        }

        if let Some(command) = self.setup.clone() {
            let executor = base_executor.clone();
            engine.setup(move || run_command(&executor, &command));
        }
        if let Some(command) = self.teardown.clone() {
            let executor = base_executor.clone();
            engine.teardown(move || run_command(&executor, &command));
        }
        if let Some(command) = self.task_setup.clone() {
            let executor = base_executor.clone();
            engine.task_setup(move |task_name| {
                run_command(&executor.clone().env("TASKR_TASK", task_name), &command)
            });
        }
        if let Some(command) = self.task_teardown.clone() {
            let executor = base_executor;
            engine.task_teardown(move |task_name| {
                run_command(&executor.clone().env("TASKR_TASK", task_name), &command)
            });
        }

        Ok(())
    }
}

fn task_executor(working_dir: PathBuf, env: Option<&BTreeMap<String, String>>) -> CommandExecutor {
    let executor = CommandExecutor::new().working_dir(working_dir);
    match env {
        Some(vars) => executor.envs(vars.clone()),
        None => executor,
    }
}
