use colored::*;
use taskr_core::Engine;

/// Run the requested target and return the process exit code
pub fn execute(mut engine: Engine) -> i32 {
    let exit_code = engine.execute();

    // Without a target the engine only printed the task list
    if engine.ledger().is_empty() {
        return exit_code;
    }

    println!();
    if exit_code == 0 {
        println!(
            "{} {}",
            "✓".green().bold(),
            "All tasks completed successfully!".green().bold()
        );
    } else {
        println!(
            "{} {}",
            "✗".red().bold(),
            format!("Run failed with exit code {}", exit_code).red().bold()
        );
    }

    exit_code
}
