//! Configuration parsing for task files

pub mod tasks;

pub use tasks::{load_tasks_file, parse_tasks_config, TasksFileConfig, DEFAULT_TASKS_FILE};
