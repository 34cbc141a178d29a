// src/dag/task.rs

//! Lightweight task handles.

use std::fmt;

use tracing::warn;

use crate::dag::graph::{Graph, NodeEntry, Work, dynamic_work, static_work};
use crate::dag::subflow::Subflow;
use crate::types::IntoTaskResult;

/// Handle to one node of a [`Graph`].
///
/// Used to declare dependencies and (re)assign callables. Handles are only
/// valid for the graph that created them; mixing handles from different
/// graphs is a usage error.
#[derive(Clone)]
pub struct Task {
    graph: Graph,
    index: usize,
    /// Graph generation the handle was issued in; see [`Graph::clear`].
    generation: u64,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("graph", &self.graph.id())
            .field("index", &self.index)
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.generation == other.generation
            && self.graph.same_graph(&other.graph)
    }
}

impl Eq for Task {}

impl Task {
    pub(crate) fn new(graph: Graph, index: usize, generation: u64) -> Self {
        Self {
            graph,
            index,
            generation,
        }
    }

    /// Insertion index of the node within its graph.
    pub fn id(&self) -> usize {
        self.index
    }

    /// True once the owning graph was cleared after this handle was issued.
    pub fn is_stale(&self) -> bool {
        self.graph.generation() != self.generation
    }

    pub fn name(&self) -> Option<String> {
        self.with_entry(|e| e.node.name()).flatten()
    }

    pub fn set_name(&self, name: impl Into<String>) -> &Self {
        let name = name.into();
        self.with_entry(|e| e.node.set_name(name));
        self
    }

    /// Builder-style [`set_name`](Task::set_name).
    pub fn named(self, name: impl Into<String>) -> Self {
        self.set_name(name);
        self
    }

    /// Add an edge from this task to each of `tasks`.
    ///
    /// Repeated edges are ignored, as is an edge from a task to itself.
    pub fn precede<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> &Self {
        for to in tasks {
            add_edge(self, to);
        }
        self
    }

    /// Add an edge from each of `tasks` to this task.
    pub fn succeed<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> &Self {
        for from in tasks {
            add_edge(from, self);
        }
        self
    }

    /// Replace this task's callable, e.g. to give a placeholder real work.
    pub fn work<F, R>(&self, f: F) -> &Self
    where
        F: FnMut() -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.replace_work(static_work(f))
    }

    /// Replace this task's callable with one that may spawn a subflow.
    pub fn work_subflow<F, R>(&self, f: F) -> &Self
    where
        F: FnMut(&mut Subflow) -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.replace_work(dynamic_work(f))
    }

    pub fn has_work(&self) -> bool {
        self.with_entry(|e| !matches!(*e.node.work().lock(), Work::Placeholder))
            .unwrap_or(false)
    }

    pub fn num_successors(&self) -> usize {
        self.with_entry(|e| e.successors.len()).unwrap_or(0)
    }

    /// Number of direct predecessors.
    pub fn num_dependents(&self) -> usize {
        self.with_entry(|e| e.num_dependents).unwrap_or(0)
    }

    fn replace_work(&self, work: Work) -> &Self {
        self.with_entry(|e| *e.node.work().lock() = work);
        self
    }

    /// Run `f` on this task's entry; `None` for a stale handle.
    fn with_entry<T>(&self, f: impl FnOnce(&NodeEntry) -> T) -> Option<T> {
        self.graph.with_nodes(|nodes| {
            if self.is_stale() {
                return None;
            }
            nodes.get(self.index).map(f)
        })
    }
}

fn add_edge(from: &Task, to: &Task) {
    debug_assert!(
        from.graph.same_graph(&to.graph),
        "precede/succeed across different graphs"
    );

    if from.index == to.index {
        warn!(
            graph = %from.graph.id(),
            task = from.index,
            "ignoring self-precedence edge"
        );
        return;
    }

    from.graph.with_nodes_mut(|nodes| {
        if from.is_stale() || to.is_stale() {
            warn!(graph = %from.graph.id(), "edge through a handle issued before clear; ignoring");
            return;
        }
        if to.index >= nodes.len() {
            warn!(graph = %from.graph.id(), task = to.index, "edge to unknown task; ignoring");
            return;
        }
        let Some(entry) = nodes.get_mut(from.index) else {
            warn!(graph = %from.graph.id(), task = from.index, "edge from unknown task; ignoring");
            return;
        };
        if entry.successors.contains(&to.index) {
            return;
        }
        entry.successors.push(to.index);
        nodes[to.index].num_dependents += 1;
    });
}
