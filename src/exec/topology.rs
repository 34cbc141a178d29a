// src/exec/topology.rs

//! One scheduling pass over a graph.
//!
//! A [`Topology`] is created per run iteration. It snapshots the graph's
//! edges into per-node [`Slot`]s (fresh in-degree counters every time),
//! seeds the ready-queue with the zero in-degree nodes, and reports back to
//! the coordinator once every node, including transitively spawned subflow
//! nodes, has finished.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::dag::graph::{Node, NodeEntry, Work};
use crate::dag::{Graph, Subflow};
use crate::engine::EngineEvent;
use crate::errors::{RunError, panic_message};
use crate::exec::pool::PoolHandle;
use crate::types::{GraphId, TaskResult};

/// Shared state of a single run iteration.
pub(crate) struct Topology {
    graph: GraphId,
    iteration: usize,
    /// Nodes not yet finished, across the root graph and every subflow.
    pending: AtomicUsize,
    failed: AtomicBool,
    failure: Mutex<Option<RunError>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Topology {
    /// Start a pass over `graph`, reporting `TopologyFinished` on `events`.
    ///
    /// An empty graph finishes immediately.
    pub(crate) fn launch(
        graph: &Graph,
        iteration: usize,
        events: mpsc::UnboundedSender<EngineEvent>,
        pool: &PoolHandle,
    ) {
        let entries = graph.entries();

        let topology = Arc::new(Topology {
            graph: graph.id(),
            iteration,
            pending: AtomicUsize::new(entries.len()),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
            events,
        });

        debug!(
            graph = %topology.graph,
            iteration,
            nodes = entries.len(),
            "launching topology"
        );

        if entries.is_empty() {
            topology.finish();
            return;
        }

        let frame = Frame::new(topology, entries, None, false);
        pool.schedule(frame.roots());
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Record a failure. The first one wins; later nodes are skipped.
    fn fail(&self, error: RunError) {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            warn!(
                graph = %self.graph,
                iteration = self.iteration,
                error = %error,
                "task failed; skipping the rest of this topology"
            );
            *slot = Some(error);
            self.failed.store(true, Ordering::Release);
        } else {
            debug!(graph = %self.graph, error = %error, "additional failure in failed topology");
        }
    }

    fn add_pending(&self, count: usize) {
        self.pending.fetch_add(count, Ordering::AcqRel);
    }

    fn node_finished(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        let outcome = match self.failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        };

        debug!(
            graph = %self.graph,
            iteration = self.iteration,
            success = outcome.is_ok(),
            "topology finished"
        );

        let event = EngineEvent::TopologyFinished {
            graph: self.graph,
            outcome,
        };
        if self.events.send(event).is_err() {
            debug!(graph = %self.graph, "coordinator gone; dropping topology completion");
        }
    }
}

/// Per-node runtime state for one pass over one graph.
struct Slot {
    node: Arc<Node>,
    successors: Vec<usize>,
    /// Predecessors not yet finished in this pass.
    join_counter: AtomicUsize,
}

/// The nodes of one graph (root or subflow) within a topology.
pub(crate) struct Frame {
    topology: Arc<Topology>,
    /// Frame of the node that spawned this subflow; `None` for the root.
    parent: Option<Arc<Frame>>,
    slots: Vec<Slot>,
    /// Nodes of this frame not yet finished.
    remaining: AtomicUsize,
    /// Whether a worker is waiting for this frame to drain.
    joined: bool,
}

impl Frame {
    fn new(
        topology: Arc<Topology>,
        entries: Vec<NodeEntry>,
        parent: Option<Arc<Frame>>,
        joined: bool,
    ) -> Arc<Self> {
        let remaining = AtomicUsize::new(entries.len());
        let slots = entries
            .into_iter()
            .map(|entry| Slot {
                node: entry.node,
                successors: entry.successors,
                join_counter: AtomicUsize::new(entry.num_dependents),
            })
            .collect();

        Arc::new(Self {
            topology,
            parent,
            slots,
            remaining,
            joined,
        })
    }

    fn roots(self: &Arc<Self>) -> Vec<Job> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.join_counter.load(Ordering::Acquire) == 0)
            .map(|(index, _)| Job {
                frame: Arc::clone(self),
                index,
            })
            .collect()
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Whether this frame is `ancestor` or one of its nested subflows.
    fn is_within(&self, ancestor: &Frame) -> bool {
        let mut current = Some(self);
        while let Some(frame) = current {
            if std::ptr::eq(frame, ancestor) {
                return true;
            }
            current = frame.parent.as_deref();
        }
        false
    }
}

/// A ready node: its frame plus its index in that frame.
pub(crate) struct Job {
    frame: Arc<Frame>,
    index: usize,
}

impl Job {
    /// Whether this job belongs to `frame`'s subflow subtree.
    pub(crate) fn is_within(&self, frame: &Frame) -> bool {
        self.frame.is_within(frame)
    }

    /// Execute the node (unless its topology already failed), then release
    /// its successors and account for its completion.
    pub(crate) fn run(self, pool: &PoolHandle) {
        let Job { frame, index } = self;
        let topology = &frame.topology;

        if topology.has_failed() {
            trace!(graph = %topology.graph, task = index, "skipping task of failed topology");
        } else {
            execute(&frame, index, pool);
        }

        let ready: Vec<Job> = frame.slots[index]
            .successors
            .iter()
            .copied()
            .filter(|&succ| {
                frame.slots[succ].join_counter.fetch_sub(1, Ordering::AcqRel) == 1
            })
            .map(|succ| Job {
                frame: Arc::clone(&frame),
                index: succ,
            })
            .collect();
        pool.schedule(ready);

        if frame.remaining.fetch_sub(1, Ordering::AcqRel) == 1 && frame.joined {
            pool.wake_all();
        }

        topology.node_finished();
    }
}

/// Run the node's callable and, for dynamic callables, its subflow.
fn execute(frame: &Arc<Frame>, index: usize, pool: &PoolHandle) {
    let node = &frame.slots[index].node;
    let topology = &frame.topology;

    trace!(graph = %topology.graph, task = index, "executing task");

    let outcome = {
        let mut work = node.work().lock();
        match &mut *work {
            Work::Placeholder => Ok(None),
            Work::Static(f) => invoke(|| f()).map(|()| None),
            Work::Dynamic(f) => {
                let mut subflow = Subflow::new();
                invoke(|| f(&mut subflow)).map(|()| Some(subflow))
            }
        }
    };

    match outcome {
        Ok(None) => {}
        Ok(Some(subflow)) => spawn_subflow(frame, node, subflow, pool),
        Err(failure) => topology.fail(failure.into_run_error(node.label(index))),
    }
}

/// Attach the nested graph to its owning node and schedule it on the same
/// topology. A joined subflow is drained before this returns.
fn spawn_subflow(frame: &Arc<Frame>, node: &Node, subflow: Subflow, pool: &PoolHandle) {
    let (graph, detached) = subflow.into_parts();
    let entries = graph.entries();
    node.attach_subgraph(Some(graph));

    if entries.is_empty() {
        return;
    }

    let topology = Arc::clone(&frame.topology);
    debug!(
        graph = %topology.graph,
        nodes = entries.len(),
        detached,
        "spawning subflow"
    );

    // Count the nested nodes before the owner can finish, so the topology
    // cannot complete while they are outstanding.
    topology.add_pending(entries.len());

    let child = Frame::new(topology, entries, Some(Arc::clone(frame)), !detached);
    pool.schedule(child.roots());

    if !detached {
        pool.corun(&child);
    }
}

enum Failure {
    Error(anyhow::Error),
    Panic(String),
}

impl Failure {
    fn into_run_error(self, task: String) -> RunError {
        match self {
            Failure::Error(source) => RunError::TaskFailed { task, source },
            Failure::Panic(message) => RunError::TaskPanicked { task, message },
        }
    }
}

fn invoke(f: impl FnOnce() -> TaskResult) -> Result<(), Failure> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(Failure::Error(error)),
        Err(payload) => Err(Failure::Panic(panic_message(payload.as_ref()))),
    }
}
