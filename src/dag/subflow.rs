// src/dag/subflow.rs

//! Dynamic subflow context handed to running task callables.

use std::ops::Deref;

use crate::dag::graph::Graph;

/// Context passed to a callable registered with
/// [`Graph::emplace_subflow`] or [`Task::work_subflow`](crate::dag::Task::work_subflow).
///
/// It derefs to a fresh nested [`Graph`], so the callable builds its subflow
/// with the usual `emplace` / `precede` calls. Once the callable returns:
///
/// - joined (the default): every node of the nested graph completes before
///   the owning task is marked done;
/// - detached: the owning task completes immediately, but the enclosing run
///   still waits for the nested nodes before it resolves.
///
/// The nested graph stays attached to the owning task afterwards (see
/// [`Graph::view`]) and is replaced the next time the task runs.
#[derive(Debug)]
pub struct Subflow {
    graph: Graph,
    detached: bool,
}

impl Subflow {
    pub(crate) fn new() -> Self {
        Self {
            graph: Graph::new(),
            detached: false,
        }
    }

    /// The nested graph being built.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Wait for the nested graph before the owning task completes (default).
    pub fn join(&mut self) {
        self.detached = false;
    }

    /// Let the owning task complete without waiting for the nested graph.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    pub fn is_joinable(&self) -> bool {
        !self.detached
    }

    pub(crate) fn into_parts(self) -> (Graph, bool) {
        (self.graph, self.detached)
    }
}

impl Deref for Subflow {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.graph
    }
}
