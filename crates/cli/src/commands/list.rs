use anyhow::Result;
use colored::*;
use taskr_core::Engine;

pub fn execute(engine: &Engine) -> Result<()> {
    println!("{}", "Tasks".bold().underline());

    if engine.registry().is_empty() {
        println!("  {}", "No tasks found".dimmed());
        return Ok(());
    }

    // Declaration order, not alphabetical
    for task in engine.registry().list() {
        println!("{}", task.name().blue().bold());
        for line in task.description().lines() {
            println!("  {}", line.dimmed());
        }
        if !task.arguments().is_empty() {
            println!("  {}", "Arguments:".bright_black());
            for argument in task.arguments() {
                let optional = if argument.optional { " (optional)" } else { "" };
                println!(
                    "    {}: {}{}",
                    argument.name.cyan(),
                    argument.description,
                    optional.dimmed()
                );
            }
        }
    }

    Ok(())
}
