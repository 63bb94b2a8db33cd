//! Task registry and graph construction
//!
//! The registry owns every declared task, keyed by name and remembered in
//! declaration order. [`Registry::build_graph`] resolves the declared edges into
//! an immutable [`TaskGraph`] before anything runs.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;

use crate::tasks::{append_edges, Task, TaskBuilder, TaskFn};
use crate::types::{ReferenceKind, TaskrError, TaskrResult};

#[derive(Default)]
pub struct Registry {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. A task with the same name is replaced but keeps its
    /// position in the declaration order.
    pub fn register(&mut self, name: impl Into<String>, body: TaskFn) -> TaskBuilder<'_> {
        let name = name.into();
        if !self.tasks.contains_key(&name) {
            self.order.push(name.clone());
        }
        let task = Task::new(name.clone(), body);
        let slot = match self.tasks.entry(name) {
            Entry::Occupied(mut entry) => {
                entry.insert(task);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(task),
        };
        TaskBuilder::new(slot)
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All tasks in declaration order
    pub fn list(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve all declared edges into a graph.
    ///
    /// Every dependency, dependee and followup must name a registered task.
    /// Dependee declarations turn into dependencies of the named task, after its
    /// own explicit ones. Dependency cycles are rejected since they can never
    /// complete.
    pub fn build_graph(&self) -> TaskrResult<TaskGraph> {
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        let mut followups: HashMap<String, Vec<String>> = HashMap::new();

        for task in self.list() {
            for (kind, names) in [
                (ReferenceKind::Followup, &task.followups),
                (ReferenceKind::Dependency, &task.dependencies),
                (ReferenceKind::Dependee, &task.dependees),
            ] {
                if let Some(missing) = names.iter().find(|name| !self.contains(name)) {
                    return Err(TaskrError::UnresolvedReference {
                        task: task.name.clone(),
                        kind,
                        name: missing.clone(),
                    });
                }
            }
            dependencies.insert(task.name.clone(), task.dependencies.clone());
            followups.insert(task.name.clone(), task.followups.clone());
        }

        // Dependees become forward dependencies of the task they name
        for task in self.list() {
            for dependee in &task.dependees {
                if let Some(list) = dependencies.get_mut(dependee) {
                    append_edges(dependee, list, [task.name.clone()]);
                }
            }
        }

        let graph = TaskGraph {
            order: self.order.clone(),
            dependencies,
            followups,
        };
        graph.check_cycles()?;
        Ok(graph)
    }

    /// Help listing: every task in declaration order with its description and arguments
    pub fn help_text(&self) -> String {
        let mut text = String::from("Please specify one of the following targets:\n");
        for task in self.list() {
            text.push_str(&format!("- {}\n", task.name));
            for line in task.description.lines() {
                text.push_str(&format!("  {}\n", line));
            }
            if !task.arguments.is_empty() {
                text.push_str("  Arguments:\n");
                for argument in &task.arguments {
                    text.push_str(&format!(
                        "    {}: {}{}\n",
                        argument.name,
                        argument.description,
                        if argument.optional { " (optional)" } else { "" }
                    ));
                }
            }
        }
        text
    }
}

/// Resolved, immutable edge set of all registered tasks
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    order: Vec<String>,
    dependencies: HashMap<String, Vec<String>>,
    followups: HashMap<String, Vec<String>>,
}

impl TaskGraph {
    /// Effective dependencies, including the ones injected by dependees
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn followups(&self, name: &str) -> &[String] {
        self.followups.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Task names in declaration order
    pub fn task_names(&self) -> &[String] {
        &self.order
    }

    /// Dependency edges as a petgraph graph, edge direction task -> dependency
    pub fn dependency_graph(&self) -> DiGraph<String, ()> {
        let mut graph = DiGraph::<String, ()>::new();
        let mut node_indices = HashMap::new();

        for name in &self.order {
            let node_index = graph.add_node(name.clone());
            node_indices.insert(name.clone(), node_index);
        }

        for name in &self.order {
            let from_node = node_indices[name];
            for dep in self.dependencies(name) {
                if let Some(&to_node) = node_indices.get(dep) {
                    graph.add_edge(from_node, to_node, ());
                }
            }
        }

        graph
    }

    fn check_cycles(&self) -> TaskrResult<()> {
        let graph = self.dependency_graph();

        // Self edges are never stored, so only multi-node components are cycles
        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut cycle = component
                    .iter()
                    .map(|node| graph[*node].clone())
                    .collect::<Vec<_>>();
                cycle.sort();
                cycle
            })
            .collect();

        if cycles.is_empty() {
            return Ok(());
        }

        cycles.sort();
        let message = cycles
            .into_iter()
            .map(|mut cycle| {
                if let Some(first) = cycle.first().cloned() {
                    cycle.push(first);
                }
                cycle.join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");

        Err(TaskrError::DependencyCycle(message))
    }
}
