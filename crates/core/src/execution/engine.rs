//! Task execution engine
//!
//! The [`Engine`] owns everything a run needs: the registry, the resolved graph,
//! the lifecycle hooks, the parsed arguments and the ledger of tasks that ran.
//! Execution is single threaded and depth first: dependencies, then the task
//! body, then followups. Every task body runs at most once per engine.

use std::time::Instant;

use colored::*;
use tracing::debug;

use crate::args::Arguments;
use crate::context::TaskContext;
use crate::execution::lifecycle::{run_guarded, Lifecycle};
use crate::execution::plan::{resolve_execution_plan, ExecutionPlan};
use crate::logging;
use crate::registry::{Registry, TaskGraph};
use crate::results::{format_duration, task_error_lines, RunReport};
use crate::tasks::{append_edges, get_task_color, TaskBuilder, TaskState};
use crate::types::{exit_code_of, TaskrError, TaskrResult};

const HEADER_WIDTH: usize = 60;

/// Registers tasks and runs targets
#[derive(Default)]
pub struct Engine {
    registry: Registry,
    graph: Option<TaskGraph>,
    hooks: Lifecycle,
    arguments: Arguments,
    ledger: Vec<String>,
}

impl Engine {
    pub fn new(arguments: Arguments) -> Self {
        Self {
            arguments,
            ..Default::default()
        }
    }

    /// Engine reading its arguments from the current process
    pub fn from_env() -> Self {
        Self::new(Arguments::from_env())
    }

    /// Register a task under `name`, replacing any task of the same name
    pub fn task<F>(&mut self, name: impl Into<String>, body: F) -> TaskBuilder<'_>
    where
        F: FnMut(&mut TaskContext<'_>) -> TaskrResult<()> + 'static,
    {
        self.graph = None;
        self.registry.register(name, Box::new(body))
    }

    pub fn setup<F>(&mut self, hook: F)
    where
        F: FnMut() -> TaskrResult<()> + 'static,
    {
        self.hooks.setup = Some(Box::new(hook));
    }

    pub fn teardown<F>(&mut self, hook: F)
    where
        F: FnMut() -> TaskrResult<()> + 'static,
    {
        self.hooks.teardown = Some(Box::new(hook));
    }

    /// Hook run before every task body, with the task's name
    pub fn task_setup<F>(&mut self, hook: F)
    where
        F: FnMut(&str) -> TaskrResult<()> + 'static,
    {
        self.hooks.task_setup = Some(Box::new(hook));
    }

    /// Hook run after every task body, even a failed one
    pub fn task_teardown<F>(&mut self, hook: F)
    where
        F: FnMut(&str) -> TaskrResult<()> + 'static,
    {
        self.hooks.task_teardown = Some(Box::new(hook));
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn task_state(&self, name: &str) -> Option<&TaskState> {
        self.registry.get(name).map(|task| task.state())
    }

    /// Names of the tasks that executed their body, in run order
    pub fn ledger(&self) -> &[String] {
        &self.ledger
    }

    pub fn report(&self) -> RunReport {
        RunReport::from_ledger(&self.registry, &self.ledger)
    }

    /// Whether dependency and followup traversal is skipped for this run
    pub fn is_exclusive(&self) -> bool {
        self.arguments.has_any(&["exclusive", "e"])
    }

    /// Check every declared edge and build the graph used for execution
    pub fn validate(&mut self) -> TaskrResult<&TaskGraph> {
        if self.graph.is_none() {
            self.graph = Some(self.registry.build_graph()?);
        }
        self.graph
            .as_ref()
            .ok_or_else(|| TaskrError::Config("task graph unavailable".to_string()))
    }

    /// Order in which task bodies would run for `target`, without running anything
    pub fn plan(&mut self, target: &str) -> TaskrResult<ExecutionPlan> {
        let exclusive = self.is_exclusive();
        let graph = self.validate()?;
        resolve_execution_plan(graph, target, exclusive)
    }

    /// Run `target` with its dependencies and followups
    pub fn run_target(&mut self, target: &str) -> TaskrResult<()> {
        self.validate()?;
        self.run_task(target)
    }

    /// Run the target named by the `target` argument and return the process exit code
    pub fn execute(&mut self) -> i32 {
        logging::init(self.arguments.has_any(&["verbose", "v"]));

        let Some(target) = self.arguments.get("target").map(str::to_string) else {
            print!("{}", self.registry.help_text());
            return 0;
        };

        println!("{}", "-".repeat(HEADER_WIDTH));
        println!("{}", "Running taskr".bold());
        println!("{}", "-".repeat(HEADER_WIDTH));
        self.log_arguments();
        println!();

        if let Err(err) = self.validate() {
            println!("{}", err.to_string().red());
            return 1;
        }

        if let Err(err) = self.hooks.run_setup() {
            // The setup failure decides the exit code
            let _ = self.hooks.run_teardown();
            return err.exit_code();
        }

        let task_result = self.run_target(&target);
        let teardown_result = self.hooks.run_teardown();

        println!();
        println!("{}", "-".repeat(HEADER_WIDTH));
        println!("{}", "Finished taskr".bold());

        let report = self.report();
        let mut exit_code = exit_code_of(task_result.as_ref().err());
        if exit_code == 0 {
            exit_code = report.first_failure_exit_code();
        }
        report.print_errors();
        println!("{}", "-".repeat(HEADER_WIDTH));
        println!();
        report.print();

        if exit_code == 0 {
            if let Err(err) = &teardown_result {
                exit_code = err.exit_code();
            }
        }

        debug!(exit_code, "run finished");
        exit_code
    }

    fn run_task(&mut self, name: &str) -> TaskrResult<()> {
        let Some(task) = self.registry.get(name) else {
            let err = TaskrError::TargetNotFound(name.to_string());
            println!("{}", err.to_string().red());
            return Err(err);
        };
        if task.state.did_run {
            return task.state.err.clone().map_or(Ok(()), Err);
        }
        if task.state.running {
            return Err(TaskrError::Reentrant(name.to_string()));
        }

        let defer_on_error = task.defer_on_error;
        let continue_on_error = task.continue_on_error;
        let exclusive = self.is_exclusive();
        let (dependencies, followups) = match &self.graph {
            Some(graph) => (
                graph.dependencies(name).to_vec(),
                graph.followups(name).to_vec(),
            ),
            None => (task.dependencies.clone(), task.followups.clone()),
        };

        self.set_running(name, true);

        if !exclusive {
            for dependency in &dependencies {
                if let Err(err) = self.run_task(dependency) {
                    if defer_on_error {
                        self.defer_error(name, err);
                    } else {
                        self.set_running(name, false);
                        return Err(err);
                    }
                }
            }
        }

        // A dependency may have pulled this task in as a followup of its own
        if let Some(state) = self.task_state(name).filter(|state| state.did_run) {
            return state.err.clone().map_or(Ok(()), Err);
        }

        if let Err(err) = self.hooks.run_task_setup(name) {
            let _ = self.hooks.run_task_teardown(name);
            self.set_running(name, false);
            return Err(err);
        }

        print_task_header(name);
        let arguments = &self.arguments;
        let Some(task) = self.registry.get_mut(name) else {
            return Err(TaskrError::TargetNotFound(name.to_string()));
        };
        let start = Instant::now();
        let result = {
            let mut ctx = TaskContext::new(&task.name, arguments, &mut task.state);
            let body = &mut task.body;
            let result = run_guarded(|| body(&mut ctx));
            ctx.finish_open_measurements();
            result
        };
        let elapsed = start.elapsed();

        let live_err = match result {
            Err(err) if defer_on_error => {
                task.state.deferred_err.get_or_insert(err);
                None
            }
            Err(err) if continue_on_error => {
                task.state.ignored_err = Some(err);
                None
            }
            Err(err) => Some(err),
            Ok(()) => None,
        };

        task.state.did_run = true;
        task.state.running = false;
        task.state.duration = elapsed;
        task.state.err = live_err.clone();
        let mut followups = followups;
        append_edges(name, &mut followups, task.state.added_followups.clone());
        print_task_footer(name, &task.state);
        self.ledger.push(name.to_string());
        debug!(task = name, status = ?task.state.status(), "task finished");

        let teardown_result = self.hooks.run_task_teardown(name);

        // The body's own failure wins over a teardown failure
        if let Some(err) = live_err {
            return Err(err);
        }
        teardown_result?;

        if !exclusive {
            for followup in &followups {
                if let Err(err) = self.run_followup(followup) {
                    if defer_on_error {
                        self.defer_error(name, err);
                    } else {
                        return Err(err);
                    }
                }
            }
        }

        match self.task_state(name).and_then(|state| state.deferred_err.clone()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// A followup that is still resolving its dependencies runs once they are done
    fn run_followup(&mut self, name: &str) -> TaskrResult<()> {
        if self.task_state(name).is_some_and(|state| state.running) {
            debug!(task = name, "followup already in progress");
            return Ok(());
        }
        self.run_task(name)
    }

    fn set_running(&mut self, name: &str, running: bool) {
        if let Some(task) = self.registry.get_mut(name) {
            task.state.running = running;
        }
    }

    /// Keep the first deferred error of a task
    fn defer_error(&mut self, name: &str, err: TaskrError) {
        if let Some(task) = self.registry.get_mut(name) {
            debug!(task = name, error = %err, "deferring error");
            task.state.deferred_err.get_or_insert(err);
        }
    }

    fn log_arguments(&self) {
        if self.arguments.is_empty() {
            return;
        }
        let line = self
            .arguments
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, value))
            .collect::<Vec<_>>()
            .join(", ");
        debug!(arguments = %line, "Arguments");
    }
}

fn print_task_header(name: &str) {
    println!(
        "{}",
        format!(
            "=== {} {}",
            name,
            "=".repeat(HEADER_WIDTH.saturating_sub(5 + name.len()))
        )
        .color(get_task_color(name))
        .bold()
    );
}

fn print_task_footer(name: &str, state: &TaskState) {
    println!(
        "{}",
        format!(
            "=== /{} {}",
            name,
            "=".repeat(HEADER_WIDTH.saturating_sub(6 + name.len()))
        )
        .color(get_task_color(name))
        .bold()
    );
    println!("Duration: {}", format_duration(state.duration));
    for line in task_error_lines(
        state.err.as_ref().map(ToString::to_string),
        state.ignored_err.as_ref().map(ToString::to_string),
        state.deferred_err.as_ref().map(ToString::to_string),
        None,
    ) {
        println!("{}", line.red());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::tasks::TaskStatus;

    fn exit_error(code: i32) -> TaskrError {
        TaskrError::ExitStatus {
            command: format!("exit {}", code),
            code,
        }
    }

    fn engine_for(target: &str) -> Engine {
        Engine::new(Arguments::from_pairs([("target", target)]))
    }

    fn assert_exit_error(err: Option<&TaskrError>, code: i32) {
        match err {
            Some(TaskrError::ExitStatus { code: actual, .. }) => assert_eq!(*actual, code),
            other => panic!("expected exit status {}, got {:?}", code, other),
        }
    }

    /// Registers Test1, Test2 (fails with 10), Test3 and All depending on all three
    fn register_dependency_scenario(engine: &mut Engine, defer_all: bool, defer_test2: bool) {
        engine.task("Test1", |_| Ok(()));
        let test2 = engine.task("Test2", |_| Err(exit_error(10)));
        if defer_test2 {
            test2.defer_on_error();
        }
        engine.task("Test3", |_| Ok(()));
        let all = engine
            .task("All", |_| Ok(()))
            .depends_on(["Test1"])
            .depends_on(["Test2"])
            .depends_on(["Test3"]);
        if defer_all {
            all.defer_on_error();
        }
    }

    #[test]
    fn test_no_error_task() {
        let mut engine = engine_for("NoErrorTask");
        engine.task("NoErrorTask", |_| Ok(()));

        assert_eq!(engine.execute(), 0);
        assert_eq!(engine.ledger(), ["NoErrorTask"]);
        assert!(engine.task_state("NoErrorTask").unwrap().err.is_none());
    }

    #[test]
    fn test_error_task() {
        let mut engine = engine_for("ErrorTask");
        engine.task("ErrorTask", |_| Err(exit_error(10)));

        assert_eq!(engine.execute(), 10);
        assert_eq!(engine.ledger().len(), 1);
        assert_exit_error(engine.task_state("ErrorTask").unwrap().err.as_ref(), 10);
    }

    #[test]
    fn test_dependency_error_with_defer() {
        let mut engine = engine_for("All");
        register_dependency_scenario(&mut engine, true, false);

        assert_eq!(engine.execute(), 10);
        assert_eq!(engine.ledger(), ["Test1", "Test2", "Test3", "All"]);
        assert_exit_error(engine.task_state("Test2").unwrap().err.as_ref(), 10);
        assert_exit_error(engine.task_state("All").unwrap().deferred_err.as_ref(), 10);
        assert_eq!(
            engine.task_state("All").unwrap().status(),
            TaskStatus::FailedDeferred
        );
    }

    #[test]
    fn test_dependency_error_without_defer() {
        let mut engine = engine_for("All");
        register_dependency_scenario(&mut engine, false, false);

        assert_eq!(engine.execute(), 10);
        assert_eq!(engine.ledger(), ["Test1", "Test2"]);
        assert_exit_error(engine.task_state("Test2").unwrap().err.as_ref(), 10);
        assert_eq!(engine.task_state("Test3").unwrap().status(), TaskStatus::Pending);
        assert_eq!(engine.task_state("All").unwrap().status(), TaskStatus::Pending);
    }

    #[test]
    fn test_dependency_error_with_defer_on_failing_task() {
        let mut engine = engine_for("All");
        register_dependency_scenario(&mut engine, false, true);

        // Test2 swallows its own failure into a deferred error and then hands it up.
        // All does not defer, so its dependency loop stops right there.
        assert_eq!(engine.execute(), 10);
        assert_eq!(engine.ledger(), ["Test1", "Test2"]);
        let test2 = engine.task_state("Test2").unwrap();
        assert!(test2.err.is_none());
        assert_exit_error(test2.deferred_err.as_ref(), 10);
        assert_eq!(test2.status(), TaskStatus::FailedDeferred);
        assert!(!engine.task_state("All").unwrap().did_run);
    }

    #[test]
    fn test_first_deferred_error_is_kept() {
        let mut engine = engine_for("All");
        engine.task("A", |_| Err(exit_error(3)));
        engine.task("B", |_| Err(exit_error(5)));
        engine
            .task("All", |_| Ok(()))
            .depends_on(["A", "B"])
            .defer_on_error();

        assert_eq!(engine.execute(), 3);
        assert_eq!(engine.ledger(), ["A", "B", "All"]);
        assert_exit_error(engine.task_state("All").unwrap().deferred_err.as_ref(), 3);
    }

    #[test]
    fn test_defer_on_both_levels_runs_everything() {
        let mut engine = engine_for("All");
        register_dependency_scenario(&mut engine, true, true);

        assert_eq!(engine.execute(), 10);
        assert_eq!(engine.ledger().len(), 4);
        assert_exit_error(engine.task_state("All").unwrap().deferred_err.as_ref(), 10);
    }

    #[test]
    fn test_continue_on_error_is_only_recorded() {
        let mut engine = engine_for("All");
        engine.task("Flaky", |_| Err(exit_error(3))).continue_on_error();
        engine.task("After", |_| Ok(()));
        engine.task("All", |_| Ok(())).depends_on(["Flaky", "After"]);

        assert_eq!(engine.execute(), 0);
        assert_eq!(engine.ledger(), ["Flaky", "After", "All"]);
        let flaky = engine.task_state("Flaky").unwrap();
        assert!(flaky.err.is_none());
        assert_exit_error(flaky.ignored_err.as_ref(), 3);
        assert_eq!(flaky.status(), TaskStatus::FailedIgnored);
    }

    #[test]
    fn test_defer_takes_precedence_over_continue() {
        let mut engine = engine_for("Both");
        engine
            .task("Both", |_| Err(exit_error(5)))
            .continue_on_error()
            .defer_on_error();

        assert_eq!(engine.execute(), 5);
        let state = engine.task_state("Both").unwrap();
        assert_exit_error(state.deferred_err.as_ref(), 5);
        assert!(state.ignored_err.is_none());
    }

    #[test]
    fn test_body_runs_once_across_multiple_edges() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let mut engine = engine_for("All");
        engine.task("Shared", move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        engine.task("Left", |_| Ok(())).depends_on(["Shared"]);
        engine.task("Right", |_| Ok(())).depends_on(["Shared"]).then(["Shared"]);
        engine.task("All", |_| Ok(())).depends_on(["Left", "Right"]).then(["Shared"]);

        assert_eq!(engine.execute(), 0);
        assert_eq!(runs.get(), 1);
        assert_eq!(engine.ledger(), ["Shared", "Left", "Right", "All"]);
    }

    #[test]
    fn test_run_target_is_idempotent() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let mut engine = Engine::default();
        engine.task("Broken", move |_| {
            counter.set(counter.get() + 1);
            Err(exit_error(4))
        });

        let first = engine.run_target("Broken").unwrap_err();
        let second = engine.run_target("Broken").unwrap_err();
        assert_eq!(first.exit_code(), 4);
        assert_eq!(second.exit_code(), 4);
        assert_eq!(runs.get(), 1);
        assert_eq!(engine.ledger().len(), 1);
    }

    #[test]
    fn test_unknown_target_runs_nothing() {
        let mut engine = engine_for("Missing");
        engine.setup(|| Ok(()));
        engine.task("Build", |_| Ok(()));

        assert_eq!(engine.execute(), 1);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_validation_failure_skips_setup() {
        let setup_ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&setup_ran);
        let mut engine = engine_for("All");
        engine.setup(move || {
            flag.set(true);
            Ok(())
        });
        engine.task("All", |_| Ok(())).depends_on(["Nope"]);

        assert_eq!(engine.execute(), 1);
        assert!(!setup_ran.get());
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_no_target_prints_help() {
        let mut engine = Engine::default();
        engine.task("Build", |_| Err(exit_error(2)));

        assert_eq!(engine.execute(), 0);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_setup_failure_runs_teardown_only() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut engine = engine_for("Build");
        {
            let calls = Rc::clone(&calls);
            engine.setup(move || {
                calls.borrow_mut().push("setup");
                Err(exit_error(7))
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.teardown(move || {
                calls.borrow_mut().push("teardown");
                Ok(())
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.task_setup(move |_| {
                calls.borrow_mut().push("task_setup");
                Ok(())
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.task_teardown(move |_| {
                calls.borrow_mut().push("task_teardown");
                Ok(())
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.task("Build", move |_| {
                calls.borrow_mut().push("body");
                Ok(())
            });
        }

        assert_eq!(engine.execute(), 7);
        assert_eq!(*calls.borrow(), ["setup", "teardown"]);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_teardown_failure_sets_exit_code() {
        let mut engine = engine_for("Build");
        engine.teardown(|| Err(exit_error(9)));
        engine.task("Build", |_| Ok(()));

        assert_eq!(engine.execute(), 9);
        assert_eq!(engine.ledger(), ["Build"]);
        assert!(engine.task_state("Build").unwrap().err.is_none());
    }

    #[test]
    fn test_task_error_beats_teardown_error_in_exit_code() {
        let mut engine = engine_for("Build");
        engine.teardown(|| Err(exit_error(9)));
        engine.task("Build", |_| Err(exit_error(3)));

        assert_eq!(engine.execute(), 3);
    }

    #[test]
    fn test_lifecycle_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut engine = engine_for("Build");
        {
            let calls = Rc::clone(&calls);
            engine.setup(move || {
                calls.borrow_mut().push("setup".to_string());
                Ok(())
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.teardown(move || {
                calls.borrow_mut().push("teardown".to_string());
                Ok(())
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.task_setup(move |name| {
                calls.borrow_mut().push(format!("task_setup:{}", name));
                Ok(())
            });
        }
        {
            let calls = Rc::clone(&calls);
            engine.task_teardown(move |name| {
                calls.borrow_mut().push(format!("task_teardown:{}", name));
                Ok(())
            });
        }
        engine.task("Build", |_| Ok(())).then(["Test"]);
        engine.task("Test", |_| Ok(()));

        assert_eq!(engine.execute(), 0);
        assert_eq!(
            *calls.borrow(),
            [
                "setup",
                "task_setup:Build",
                "task_teardown:Build",
                "task_setup:Test",
                "task_teardown:Test",
                "teardown",
            ]
        );
    }

    #[test]
    fn test_task_setup_failure_skips_body_but_runs_teardown() {
        let teardown_ran = Rc::new(Cell::new(false));
        let body_ran = Rc::new(Cell::new(false));
        let mut engine = Engine::default();
        engine.task_setup(|_| Err(TaskrError::task("no workspace")));
        {
            let teardown_ran = Rc::clone(&teardown_ran);
            engine.task_teardown(move |_| {
                teardown_ran.set(true);
                Err(TaskrError::task("ignored"))
            });
        }
        {
            let body_ran = Rc::clone(&body_ran);
            engine.task("Build", move |_| {
                body_ran.set(true);
                Ok(())
            });
        }

        let err = engine.run_target("Build").unwrap_err();
        assert_eq!(err.to_string(), "no workspace");
        assert!(teardown_ran.get());
        assert!(!body_ran.get());
        assert!(engine.ledger().is_empty());
        assert_eq!(engine.task_state("Build").unwrap().status(), TaskStatus::Pending);
    }

    #[test]
    fn test_body_error_takes_precedence_over_task_teardown_error() {
        let mut engine = Engine::default();
        engine.task_teardown(|_| Err(exit_error(2)));
        engine.task("Build", |_| Err(exit_error(6)));

        let err = engine.run_target("Build").unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_task_teardown_error_stops_followups() {
        let followup_ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&followup_ran);
        let mut engine = Engine::default();
        engine.task_teardown(|_| Err(exit_error(2)));
        engine.task("Build", |_| Ok(())).then(["Test"]);
        engine.task("Test", move |_| {
            flag.set(true);
            Ok(())
        });

        let err = engine.run_target("Build").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!followup_ran.get());
        assert!(engine.task_state("Build").unwrap().err.is_none());
    }

    #[test]
    fn test_panic_is_contained() {
        let mut engine = engine_for("All");
        engine.task("Crash", |_| panic!("disk on fire"));
        engine.task("All", |_| Ok(())).depends_on(["Crash"]);

        assert_eq!(engine.execute(), 1);
        assert_eq!(engine.ledger(), ["Crash"]);
        let err = engine.task_state("Crash").unwrap().err.clone().unwrap();
        assert_eq!(err.to_string(), "task panicked: disk on fire");
    }

    #[test]
    fn test_followups_run_after_success_only() {
        let mut engine = Engine::default();
        engine.task("Build", |_| Err(exit_error(1))).then(["Test"]);
        engine.task("Test", |_| Ok(()));

        assert!(engine.run_target("Build").is_err());
        assert_eq!(engine.ledger(), ["Build"]);
    }

    #[test]
    fn test_followups_run_after_deferred_error() {
        let mut engine = Engine::default();
        engine
            .task("Build", |_| Err(exit_error(8)))
            .defer_on_error()
            .then(["Report", "Notify"]);
        engine.task("Report", |_| Err(exit_error(4)));
        engine.task("Notify", |_| Ok(()));

        let err = engine.run_target("Build").unwrap_err();
        // The first deferred error is the one surfaced
        assert_eq!(err.exit_code(), 8);
        assert_eq!(engine.ledger(), ["Build", "Report", "Notify"]);
    }

    #[test]
    fn test_exclusive_skips_dependencies_and_followups() {
        let mut engine = Engine::new(Arguments::parse(["--target", "Build", "-e"]));
        engine.task("Fetch", |_| Ok(()));
        engine.task("Build", |_| Ok(())).depends_on(["Fetch"]).then(["Test"]);
        engine.task("Test", |_| Ok(()));

        assert_eq!(engine.execute(), 0);
        assert_eq!(engine.ledger(), ["Build"]);
    }

    #[test]
    fn test_dependees_run_before_their_target() {
        let mut engine = engine_for("Build");
        engine.task("Build", |_| Ok(()));
        engine.task("Lint", |_| Ok(())).dependee_of(["Build"]);

        assert_eq!(engine.execute(), 0);
        assert_eq!(engine.ledger(), ["Lint", "Build"]);
    }

    #[test]
    fn test_dynamic_followups() {
        let mut engine = Engine::default();
        engine.task("Build", |ctx| {
            ctx.add_followup(["Package"]);
            Ok(())
        });
        engine.task("Package", |_| Ok(()));

        assert!(engine.run_target("Build").is_ok());
        assert_eq!(engine.ledger(), ["Build", "Package"]);
    }

    #[test]
    fn test_dynamic_followup_to_unknown_task() {
        let mut engine = Engine::default();
        engine.task("Build", |ctx| {
            ctx.add_followup(["Ghost"]);
            Ok(())
        });

        let err = engine.run_target("Build").unwrap_err();
        assert!(matches!(err, TaskrError::TargetNotFound(ref name) if name == "Ghost"));
    }

    #[test]
    fn test_followup_targeting_its_dependent_runs_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let mut engine = engine_for("Test");
        engine.task("Build", |_| Ok(())).then(["Test"]);
        engine
            .task("Test", move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .depends_on(["Build"]);

        assert_eq!(engine.plan("Test").unwrap().order, ["Build", "Test"]);
        assert_eq!(engine.execute(), 0);
        assert_eq!(engine.ledger(), ["Build", "Test"]);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_dynamic_followup_back_into_running_task_runs_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let mut engine = Engine::default();
        engine.task("Build", |ctx| {
            ctx.add_followup(["All"]);
            Ok(())
        });
        engine
            .task("All", move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .depends_on(["Build"]);

        assert!(engine.run_target("All").is_ok());
        assert_eq!(engine.ledger(), ["Build", "All"]);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_dependency_back_into_running_task_is_rejected() {
        let mut engine = Engine::default();
        engine.task("Fetch", |_| Ok(())).then(["Check"]);
        engine.task("Check", |_| Ok(())).depends_on(["Build"]);
        engine.task("Build", |_| Ok(())).depends_on(["Fetch"]);

        let err = engine.run_target("Build").unwrap_err();
        assert!(matches!(err, TaskrError::Reentrant(ref name) if name == "Build"));
        assert_eq!(engine.ledger(), ["Fetch"]);
    }

    #[test]
    fn test_measurements_attach_to_running_task() {
        let mut engine = Engine::default();
        engine.task("Measured", |ctx| {
            ctx.measure_time("Sub-Item-1", || ());
            let outer = ctx.start_measurement("Sub-Item-2");
            let inner = ctx.start_measurement("Sub-Item-3");
            ctx.finish_measurement(inner);
            ctx.finish_measurement(outer);
            Ok(())
        });

        engine.run_target("Measured").unwrap();
        let report = engine.report();
        let names: Vec<_> = report.entries[0]
            .measurements
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["Sub-Item-1", "Sub-Item-2", "Sub-Item-3"]);
    }

    #[test]
    fn test_task_bodies_read_arguments() {
        let seen = Rc::new(RefCell::new(String::new()));
        let sink = Rc::clone(&seen);
        let mut engine = Engine::new(Arguments::parse(["--target=Hello", "--name", "Ada"]));
        engine.task("Hello", move |ctx| {
            *sink.borrow_mut() = ctx.argument_or("name", "Wulfgang").to_string();
            Ok(())
        });

        assert_eq!(engine.execute(), 0);
        assert_eq!(*seen.borrow(), "Ada");
    }

    #[test]
    fn test_exit_code_comes_from_first_failing_ledger_entry() {
        let mut engine = engine_for("All");
        engine.task("First", |_| Err(exit_error(11))).defer_on_error();
        engine.task("Second", |_| Err(exit_error(12))).defer_on_error();
        engine
            .task("All", |_| Ok(()))
            .depends_on(["First", "Second"])
            .continue_on_error();

        // All keeps going but has no defer of its own, so First's error halts it
        assert_eq!(engine.execute(), 11);
        assert_eq!(engine.ledger(), ["First"]);
    }

    #[test]
    fn test_registering_after_validation_rebuilds_graph() {
        let mut engine = Engine::default();
        engine.task("Build", |_| Ok(()));
        engine.validate().unwrap();
        engine.task("Test", |_| Ok(())).depends_on(["Build"]);

        engine.run_target("Test").unwrap();
        assert_eq!(engine.ledger(), ["Build", "Test"]);
    }

    #[test]
    fn test_plan_follows_exclusive_flag() {
        let mut engine = Engine::default();
        engine.task("Fetch", |_| Ok(()));
        engine.task("Build", |_| Ok(())).depends_on(["Fetch"]);

        assert_eq!(engine.plan("Build").unwrap().order, ["Fetch", "Build"]);
        engine.arguments_mut().set("exclusive", "");
        assert_eq!(engine.plan("Build").unwrap().order, ["Build"]);
        assert!(engine.ledger().is_empty());
    }
}
