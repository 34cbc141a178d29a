// src/dag/graph.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::subflow::Subflow;
use crate::dag::task::Task;
use crate::dag::view::{GraphView, NodeView, WorkKind};
use crate::errors::{Result, RundagError};
use crate::types::{GraphId, IntoTaskResult, TaskResult};

pub(crate) type StaticFn = Box<dyn FnMut() -> TaskResult + Send>;
pub(crate) type DynamicFn = Box<dyn FnMut(&mut Subflow) -> TaskResult + Send>;

/// The callable attached to a node.
pub(crate) enum Work {
    /// No callable; the node only orders its neighbours.
    Placeholder,
    Static(StaticFn),
    /// Receives a [`Subflow`] and may build a nested graph.
    Dynamic(DynamicFn),
}

impl Work {
    pub(crate) fn kind(&self) -> WorkKind {
        match self {
            Work::Placeholder => WorkKind::Placeholder,
            Work::Static(_) => WorkKind::Static,
            Work::Dynamic(_) => WorkKind::Subflow,
        }
    }
}

pub(crate) fn static_work<F, R>(mut f: F) -> Work
where
    F: FnMut() -> R + Send + 'static,
    R: IntoTaskResult,
{
    Work::Static(Box::new(move || f().into_task_result()))
}

pub(crate) fn dynamic_work<F, R>(mut f: F) -> Work
where
    F: FnMut(&mut Subflow) -> R + Send + 'static,
    R: IntoTaskResult,
{
    Work::Dynamic(Box::new(move |sf: &mut Subflow| f(sf).into_task_result()))
}

/// A unit of work, shared between its graph and any topology running it.
///
/// Structural data (edges) lives in the owning graph's [`NodeEntry`]; the
/// node itself only carries what a worker touches while executing it.
pub(crate) struct Node {
    name: RwLock<Option<String>>,
    work: Mutex<Work>,
    /// Nested graph built by the last execution of a dynamic callable.
    subgraph: Mutex<Option<Graph>>,
}

impl Node {
    fn new(work: Work) -> Self {
        Self {
            name: RwLock::new(None),
            work: Mutex::new(work),
            subgraph: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.write() = Some(name);
    }

    /// Name used in logs and errors: the user-given name, or `task-<index>`.
    pub(crate) fn label(&self, index: usize) -> String {
        self.name().unwrap_or_else(|| format!("task-{index}"))
    }

    pub(crate) fn work(&self) -> &Mutex<Work> {
        &self.work
    }

    pub(crate) fn attach_subgraph(&self, graph: Option<Graph>) {
        *self.subgraph.lock() = graph;
    }

    pub(crate) fn subgraph(&self) -> Option<Graph> {
        self.subgraph.lock().clone()
    }
}

/// A node plus its outgoing edges and static predecessor count.
#[derive(Clone)]
pub(crate) struct NodeEntry {
    pub(crate) node: Arc<Node>,
    pub(crate) successors: Vec<usize>,
    pub(crate) num_dependents: usize,
}

struct GraphInner {
    id: GraphId,
    name: RwLock<Option<String>>,
    nodes: RwLock<Vec<NodeEntry>>,
    /// Bumped by `clear` (under the `nodes` write lock) so handles issued
    /// before it can be told apart from handles to new nodes.
    generation: AtomicU64,
}

/// A reusable, insertion-ordered DAG of tasks.
///
/// `Graph` is a cheap handle: clones refer to the same underlying graph.
/// Build it with [`emplace`](Graph::emplace) / [`placeholder`](Graph::placeholder)
/// and wire it with [`Task::precede`], then hand it to an
/// [`Executor`](crate::engine::Executor) as many times as needed.
///
/// Caller obligations (not checked on the scheduling path):
/// - the successor relation must be acyclic when a run starts
///   ([`check_acyclic`](Graph::check_acyclic) is available as an opt-in check);
/// - the graph must not be mutated while one of its runs is in flight;
/// - a graph must be run by at most one executor at a time.
///
/// Breaking these never causes memory unsafety, but the resulting run order
/// is unspecified.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.inner.id)
            .field("name", &*self.inner.name.read())
            .field("num_nodes", &self.num_nodes())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GraphInner {
                id: GraphId::next(),
                name: RwLock::new(None),
                nodes: RwLock::new(Vec::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let graph = Self::new();
        graph.set_name(name);
        graph
    }

    pub fn id(&self) -> GraphId {
        self.inner.id
    }

    pub fn name(&self) -> Option<String> {
        self.inner.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.write() = Some(name.into());
    }

    /// Add a task running `f`.
    pub fn emplace<F, R>(&self, f: F) -> Task
    where
        F: FnMut() -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.push_node(static_work(f))
    }

    /// Add a task whose callable receives a [`Subflow`] and may spawn a
    /// nested graph at execution time.
    pub fn emplace_subflow<F, R>(&self, f: F) -> Task
    where
        F: FnMut(&mut Subflow) -> R + Send + 'static,
        R: IntoTaskResult,
    {
        self.push_node(dynamic_work(f))
    }

    /// Add a task with no callable, usable purely as a synchronization point.
    pub fn placeholder(&self) -> Task {
        self.push_node(Work::Placeholder)
    }

    /// Chain `tasks` so each precedes the next.
    pub fn linearize(&self, tasks: &[Task]) {
        for pair in tasks.windows(2) {
            pair[0].precede([&pair[1]]);
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.inner.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_nodes() == 0
    }

    /// Remove every node.
    ///
    /// [`Task`] handles issued before the call become stale: they never
    /// resolve to nodes added afterwards, reads on them return empty values
    /// and edits through them are ignored (see [`Task::is_stale`]).
    pub fn clear(&self) {
        let mut nodes = self.inner.nodes.write();
        nodes.clear();
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Opt-in validation that the successor relation has no cycle.
    ///
    /// Never called by the executor; useful in tests and debug builds of
    /// graph-building code.
    pub fn check_acyclic(&self) -> Result<()> {
        let entries = self.entries();
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

        for (index, entry) in entries.iter().enumerate() {
            graph.add_node(index);
            for &succ in &entry.successors {
                graph.add_edge(index, succ, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let index = cycle.node_id();
                let label = entries
                    .get(index)
                    .map(|e| e.node.label(index))
                    .unwrap_or_else(|| format!("task-{index}"));
                Err(RundagError::Cycle(format!(
                    "cycle detected in graph involving task '{label}'"
                )))
            }
        }
    }

    /// Read-only snapshot of nodes, edges, names and nested subflow graphs,
    /// for dump/visualization collaborators.
    ///
    /// Only meaningful while no run of this graph is in flight.
    pub fn view(&self) -> GraphView {
        let nodes = self
            .entries()
            .into_iter()
            .enumerate()
            .map(|(id, entry)| NodeView {
                id,
                name: entry.node.name(),
                kind: entry.node.work().lock().kind(),
                successors: entry.successors.clone(),
                num_dependents: entry.num_dependents,
                subflow: entry.node.subgraph().map(|g| g.view()),
            })
            .collect();

        GraphView {
            id: self.id(),
            name: self.name(),
            nodes,
        }
    }

    /// Clone of the current node entries. Topologies run against this
    /// snapshot, so edits made mid-run never reach the running pass.
    pub(crate) fn entries(&self) -> Vec<NodeEntry> {
        self.inner.nodes.read().clone()
    }

    /// Current handle generation; stable while the `nodes` lock is held.
    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    pub(crate) fn same_graph(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with mutable access to the node table.
    pub(crate) fn with_nodes_mut<T>(&self, f: impl FnOnce(&mut Vec<NodeEntry>) -> T) -> T {
        f(&mut self.inner.nodes.write())
    }

    pub(crate) fn with_nodes<T>(&self, f: impl FnOnce(&[NodeEntry]) -> T) -> T {
        f(&self.inner.nodes.read())
    }

    fn push_node(&self, work: Work) -> Task {
        let (index, generation) = self.with_nodes_mut(|nodes| {
            nodes.push(NodeEntry {
                node: Arc::new(Node::new(work)),
                successors: Vec::new(),
                num_dependents: 0,
            });
            (nodes.len() - 1, self.generation())
        });
        Task::new(self.clone(), index, generation)
    }
}
