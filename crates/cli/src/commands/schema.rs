use anyhow::Result;
use taskr_core::configs::tasks::tasks_file_schema;

pub fn execute() -> Result<()> {
    let schema = serde_json::to_string_pretty(&tasks_file_schema())?;
    println!("{}", schema);
    Ok(())
}
