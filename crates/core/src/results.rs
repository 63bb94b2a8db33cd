//! Run report
//!
//! Summary of the tasks that executed their body during a run, in execution
//! order, with exit codes, durations and the sub-measurements each task took.

use std::time::Duration;

use colored::*;

use crate::registry::Registry;
use crate::tasks::TimeMeasurement;

const SUMMARY_WIDTH: usize = 80;

/// One executed task
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub name: String,
    pub exit_code: i32,
    pub duration: Duration,
    /// The run carries a live or deferred error
    pub failed: bool,
    pub errors: Vec<String>,
    pub measurements: Vec<TimeMeasurement>,
}

/// Result of a run, built from the ledger
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub entries: Vec<RunEntry>,
}

impl RunReport {
    pub fn from_ledger(registry: &Registry, ledger: &[String]) -> Self {
        let entries = ledger
            .iter()
            .filter_map(|name| registry.get(name))
            .map(|task| {
                let state = task.state();
                RunEntry {
                    name: task.name().to_string(),
                    exit_code: state.exit_code(),
                    duration: state.duration,
                    failed: state.has_failure(),
                    errors: task_error_lines(
                        state.err.as_ref().map(ToString::to_string),
                        state.ignored_err.as_ref().map(ToString::to_string),
                        state.deferred_err.as_ref().map(ToString::to_string),
                        Some(task.name()),
                    ),
                    measurements: state.measurements.clone(),
                }
            })
            .collect();

        Self { entries }
    }

    /// Sum of the top level task durations; sub-measurements are not added
    pub fn total_duration(&self) -> Duration {
        self.entries.iter().map(|entry| entry.duration).sum()
    }

    /// Exit code of the first entry carrying a live or deferred error
    pub fn first_failure_exit_code(&self) -> i32 {
        self.entries
            .iter()
            .map(|entry| entry.exit_code)
            .find(|code| *code != 0)
            .unwrap_or(0)
    }

    /// The summary table as plain text lines
    pub fn summary_lines(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let mut lines = vec![
            format!("{:<50}{:<13}{:<17}", "Task", "Exit Code", "Duration"),
            "-".repeat(SUMMARY_WIDTH),
        ];
        for entry in &self.entries {
            lines.push(entry_line(entry));
            lines.extend(measurement_lines(&entry.measurements));
        }
        lines.push("-".repeat(SUMMARY_WIDTH));
        lines.push(format!(
            "{:<63}{:<18}",
            "Total",
            format_duration(self.total_duration())
        ));
        lines
    }

    /// Print the summary table; failed tasks in red, sub-measurements dimmed
    pub fn print(&self) {
        if self.entries.is_empty() {
            return;
        }

        println!(
            "{}",
            format!("{:<50}{:<13}{:<17}", "Task", "Exit Code", "Duration").green()
        );
        println!("{}", "-".repeat(SUMMARY_WIDTH).green());
        for entry in &self.entries {
            let line = entry_line(entry);
            if entry.failed {
                println!("{}", line.red());
            } else {
                println!("{}", line.green());
            }
            for measurement in measurement_lines(&entry.measurements) {
                println!("{}", measurement.white());
            }
        }
        println!("{}", "-".repeat(SUMMARY_WIDTH).green());
        println!(
            "{}",
            format!(
                "{:<63}{:<18}",
                "Total",
                format_duration(self.total_duration())
            )
            .green()
            .bold()
        );
    }

    /// Print every recorded error, each with its task name
    pub fn print_errors(&self) {
        for entry in &self.entries {
            for error in &entry.errors {
                println!("{}", error.red());
            }
        }
    }
}

fn entry_line(entry: &RunEntry) -> String {
    format!(
        "{:<50}{:<13}{:<17}",
        entry.name,
        entry.exit_code,
        format_duration(entry.duration)
    )
}

fn measurement_lines(measurements: &[TimeMeasurement]) -> Vec<String> {
    measurements
        .iter()
        .enumerate()
        .map(|(i, measurement)| {
            let prefix = if i == measurements.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            format!(
                "{} {:<60}{:<17}",
                prefix,
                measurement.name,
                format_duration(measurement.duration)
            )
        })
        .collect()
}

/// Error lines for a task run, optionally naming the task
pub(crate) fn task_error_lines(
    err: Option<String>,
    ignored_err: Option<String>,
    deferred_err: Option<String>,
    task_name: Option<&str>,
) -> Vec<String> {
    let suffix = task_name
        .map(|name| format!(" in '{}'", name))
        .unwrap_or_default();
    [
        ("Task error", err),
        ("Ignored error", ignored_err),
        ("Deferred error", deferred_err),
    ]
    .into_iter()
    .filter_map(|(label, message)| message.map(|message| format!("{}{}: {}", label, suffix, message)))
    .collect()
}

/// Format a duration as `HH:MM:SS.micros`
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:06}",
        total_seconds / 3600,
        (total_seconds / 60) % 60,
        total_seconds % 60,
        duration.subsec_micros()
    )
}
