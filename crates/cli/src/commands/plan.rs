use anyhow::Result;
use colored::*;
use taskr_core::Engine;

pub fn execute(engine: &mut Engine, target: &str) -> Result<()> {
    println!("{} {}", "Execution plan for".bold(), target.cyan());

    let execution_plan = engine
        .plan(target)
        .map_err(|e| anyhow::anyhow!("Failed to get execution plan: {}", e))?;

    if execution_plan.exclusive {
        println!("{}", "(exclusive: dependencies and followups skipped)".dimmed());
    }

    println!("\n{}:", "Execution order".bold());
    for (i, task) in execution_plan.order.iter().enumerate() {
        println!("  {}. {}", i + 1, task);
    }

    Ok(())
}
