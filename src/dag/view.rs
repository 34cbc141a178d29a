// src/dag/view.rs

//! Read-only traversal of a graph for dump/visualization collaborators.

use crate::types::GraphId;

/// What kind of callable a node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    Placeholder,
    Static,
    /// Callable receives a subflow context.
    Subflow,
}

/// Owned snapshot of one node.
#[derive(Debug, Clone)]
pub struct NodeView {
    /// Insertion index; successors refer to nodes by this id.
    pub id: usize,
    pub name: Option<String>,
    pub kind: WorkKind,
    pub successors: Vec<usize>,
    pub num_dependents: usize,
    /// Nested graph spawned by the node's last execution.
    pub subflow: Option<GraphView>,
}

/// Owned snapshot of a graph, including nested subflow graphs.
#[derive(Debug, Clone)]
pub struct GraphView {
    pub id: GraphId,
    pub name: Option<String>,
    pub nodes: Vec<NodeView>,
}

impl GraphView {
    pub fn node(&self, id: usize) -> Option<&NodeView> {
        self.nodes.get(id)
    }

    /// Find a node by name at this level (nested graphs are not searched).
    pub fn find(&self, name: &str) -> Option<&NodeView> {
        self.nodes.iter().find(|n| n.name.as_deref() == Some(name))
    }

    /// All `(from, to)` edges at this level, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.nodes
            .iter()
            .flat_map(|n| n.successors.iter().map(move |&s| (n.id, s)))
    }

    /// Node count including every nested subflow graph, transitively.
    pub fn total_nodes(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| 1 + n.subflow.as_ref().map_or(0, GraphView::total_nodes))
            .sum()
    }
}
