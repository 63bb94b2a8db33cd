use anyhow::Result;
use colored::*;
use taskr_core::Engine;

pub fn execute(engine: &mut Engine) -> Result<()> {
    println!("{}", "Task Graph:".bold().underline());

    let graph = engine
        .validate()
        .map_err(|e| anyhow::anyhow!("Failed to build task graph: {}", e))?;

    for name in graph.task_names() {
        println!("{}", name.blue().bold());

        let deps = graph.dependencies(name);
        if !deps.is_empty() {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        } else {
            println!("  {}", "no dependencies".dimmed());
        }

        let followups = graph.followups(name);
        if !followups.is_empty() {
            println!("  {} {}", "then:".dimmed(), followups.join(", "));
        }
        println!();
    }

    Ok(())
}
