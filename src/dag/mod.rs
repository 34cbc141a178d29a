// src/dag/mod.rs

//! Graph data model.
//!
//! - [`graph`] holds the reusable, client-built [`Graph`] of nodes and edges.
//! - [`task`] provides [`Task`] handles used to wire dependencies.
//! - [`subflow`] is the context a running callable uses to spawn a nested graph.
//! - [`view`] is the read-only traversal consumed by dump collaborators.

pub mod graph;
pub mod subflow;
pub mod task;
pub mod view;

pub use graph::Graph;
pub use subflow::Subflow;
pub use task::Task;
pub use view::{GraphView, NodeView, WorkKind};
