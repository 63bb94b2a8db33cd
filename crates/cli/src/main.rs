use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use taskr_core::configs::{load_tasks_file, TasksFileConfig, DEFAULT_TASKS_FILE};
use taskr_core::{Arguments, Engine};

mod commands;

/// Taskr - A build-automation task runner
#[derive(Parser)]
#[command(name = "taskr")]
#[command(about = "Run tasks with dependencies, followups and lifecycle hooks")]
#[command(version)]
struct Cli {
    /// Path to the task file
    #[arg(short, long, default_value = DEFAULT_TASKS_FILE)]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available tasks
    List,
    /// Show the resolved task graph
    Graph,
    /// Show the execution order for a target without running it
    Plan {
        /// Task to plan
        target: String,
        /// Only the target itself, without dependencies and followups
        #[arg(short, long)]
        exclusive: bool,
    },
    /// Print the JSON schema of the task file
    Schema,
    /// Run a target, e.g. `taskr run --target Build -v --name value`
    Run {
        /// Arguments handed to the tasks; `--target` selects what runs
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        return commands::schema::execute();
    }

    let config = load_tasks_file(&cli.file)
        .map_err(|e| anyhow::anyhow!("Failed to load task file: {}", e))?;
    let base_dir = cli
        .file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    // Execute command (CLI layer only handles presentation)
    match cli.command {
        Commands::List => {
            let engine = build_engine(&config, base_dir, Arguments::default())?;
            commands::list::execute(&engine)
        }
        Commands::Graph => {
            let mut engine = build_engine(&config, base_dir, Arguments::default())?;
            commands::graph::execute(&mut engine)
        }
        Commands::Plan { target, exclusive } => {
            let mut arguments = Arguments::default();
            if exclusive {
                arguments.set("exclusive", "");
            }
            let mut engine = build_engine(&config, base_dir, arguments)?;
            commands::plan::execute(&mut engine, &target)
        }
        Commands::Run { args } => {
            let engine = build_engine(&config, base_dir, Arguments::parse(&args))?;
            let exit_code = commands::run::execute(engine);
            std::process::exit(exit_code);
        }
        Commands::Schema => commands::schema::execute(),
    }
}

fn build_engine(config: &TasksFileConfig, base_dir: &Path, arguments: Arguments) -> Result<Engine> {
    let mut engine = Engine::new(arguments);
    config
        .register(&mut engine, base_dir)
        .map_err(|e| anyhow::anyhow!("Failed to register tasks: {}", e))?;
    Ok(engine)
}
