//! Execution planning
//!
//! Walks the task graph the same way the engine does, without running anything,
//! to show the order in which task bodies would execute if every task succeeded.

use std::collections::HashSet;

use crate::registry::TaskGraph;
use crate::types::{TaskrError, TaskrResult};

/// Order in which task bodies would run for a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub target: String,
    pub exclusive: bool,
    pub order: Vec<String>,
}

/// Resolve the execution order for a target: dependencies depth-first, then the
/// task itself, then its followups, each task at most once.
pub fn resolve_execution_plan(
    graph: &TaskGraph,
    target: &str,
    exclusive: bool,
) -> TaskrResult<ExecutionPlan> {
    let mut walk = PlanWalk {
        graph,
        exclusive,
        done: HashSet::new(),
        in_progress: HashSet::new(),
        order: Vec::new(),
    };
    walk.visit(target)?;

    Ok(ExecutionPlan {
        target: target.to_string(),
        exclusive,
        order: walk.order,
    })
}

struct PlanWalk<'a> {
    graph: &'a TaskGraph,
    exclusive: bool,
    done: HashSet<String>,
    in_progress: HashSet<String>,
    order: Vec<String>,
}

impl PlanWalk<'_> {
    fn visit(&mut self, name: &str) -> TaskrResult<()> {
        if !self.graph.contains(name) {
            return Err(TaskrError::TargetNotFound(name.to_string()));
        }
        if self.done.contains(name) {
            return Ok(());
        }
        if !self.in_progress.insert(name.to_string()) {
            return Err(TaskrError::Reentrant(name.to_string()));
        }

        let graph = self.graph;
        if !self.exclusive {
            for dependency in graph.dependencies(name) {
                self.visit(dependency)?;
            }
        }
        if self.done.contains(name) {
            self.in_progress.remove(name);
            return Ok(());
        }

        self.in_progress.remove(name);
        self.done.insert(name.to_string());
        self.order.push(name.to_string());

        if !self.exclusive {
            for followup in graph.followups(name) {
                if self.in_progress.contains(followup.as_str()) {
                    continue;
                }
                self.visit(followup)?;
            }
        }
        Ok(())
    }
}
