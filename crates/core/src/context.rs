//! Invocation context handed to every task body
//!
//! The context is scoped to one execution of one task. It gives read access to
//! the resolved arguments and lets the body record sub-measurements or queue
//! more followups for itself.

use std::time::Instant;

use crate::args::Arguments;
use crate::tasks::{append_edges, TaskState, TimeMeasurement};

/// Handle for a running sub-measurement, see [`TaskContext::start_measurement`]
#[derive(Debug)]
#[must_use = "a measurement records nothing until it is finished"]
pub struct MeasurementHandle {
    index: usize,
}

pub struct TaskContext<'a> {
    task_name: &'a str,
    arguments: &'a Arguments,
    state: &'a mut TaskState,
    open: Vec<usize>,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(task_name: &'a str, arguments: &'a Arguments, state: &'a mut TaskState) -> Self {
        Self {
            task_name,
            arguments,
            state,
            open: Vec::new(),
        }
    }

    pub fn task_name(&self) -> &str {
        self.task_name
    }

    pub fn arguments(&self) -> &Arguments {
        self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name)
    }

    pub fn argument_or<'b>(&'b self, name: &str, default: &'b str) -> &'b str {
        self.arguments.get_or(name, default)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.has(name)
    }

    /// Queue more followups for the running task.
    ///
    /// They run after the declared followups, with the same error handling.
    pub fn add_followup<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append_edges(self.task_name, &mut self.state.added_followups, names);
    }

    /// Run `f` and attach its wall-clock time to the running task
    pub fn measure_time<T, F>(&mut self, name: impl Into<String>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let handle = self.start_measurement(name);
        let result = f();
        self.finish_measurement(handle);
        result
    }

    /// Start a named measurement. Entries are listed in start order.
    pub fn start_measurement(&mut self, name: impl Into<String>) -> MeasurementHandle {
        let index = self.state.measurements.len();
        self.state.measurements.push(TimeMeasurement {
            name: name.into(),
            start_time: Instant::now(),
            duration: Default::default(),
        });
        self.open.push(index);
        MeasurementHandle { index }
    }

    pub fn finish_measurement(&mut self, handle: MeasurementHandle) {
        self.close(handle.index);
    }

    fn close(&mut self, index: usize) {
        if let Some(measurement) = self.state.measurements.get_mut(index) {
            measurement.duration = measurement.start_time.elapsed();
        }
        self.open.retain(|open| *open != index);
    }

    /// Close measurements the body left running
    pub(crate) fn finish_open_measurements(&mut self) {
        for index in std::mem::take(&mut self.open) {
            if let Some(measurement) = self.state.measurements.get_mut(index) {
                measurement.duration = measurement.start_time.elapsed();
            }
        }
    }
}
