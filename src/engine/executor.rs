// src/engine/executor.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::dag::Graph;
use crate::errors::{Result, RunError};
use crate::exec::WorkerPool;

use super::runtime::{RunTracker, Runtime};
use super::{Callback, EngineEvent, RunFuture, RunMode, RunRequest};

/// Runs graphs on a fixed pool of worker threads.
///
/// Every run-family call returns a [`RunFuture`] that resolves when the
/// whole requested sequence (not just one iteration) is done. Requests
/// against the same graph are serialized in arrival order; requests against
/// different graphs run concurrently, sharing the workers.
///
/// ```no_run
/// use rundag::{Executor, Graph};
///
/// let executor = Executor::with_workers(4)?;
/// let graph = Graph::new();
/// let a = graph.emplace(|| println!("A"));
/// let b = graph.emplace(|| println!("B"));
/// a.precede([&b]);
///
/// executor.run_n(&graph, 3).wait()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// Dropping the executor waits for every outstanding request first.
pub struct Executor {
    events: mpsc::UnboundedSender<EngineEvent>,
    tracker: Arc<RunTracker>,
    next_request: AtomicU64,
    coordinator: Option<JoinHandle<()>>,
    pool: WorkerPool,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("num_workers", &self.num_workers())
            .field("num_topologies", &self.num_topologies())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Validate `config`, start the worker pool and the coordinator thread.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::start(&config)?;
        let tracker = Arc::new(RunTracker::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let runtime = Runtime::new(events_rx, events_tx.clone(), pool.handle(), Arc::clone(&tracker));
        let coordinator = thread::Builder::new()
            .name("rundag-coordinator".to_string())
            .spawn(move || runtime.run())?;

        info!(num_workers = pool.num_workers(), "executor started");

        Ok(Self {
            events: events_tx,
            tracker,
            next_request: AtomicU64::new(1),
            coordinator: Some(coordinator),
            pool,
        })
    }

    /// Executor with `num_workers` threads and default settings otherwise.
    pub fn with_workers(num_workers: usize) -> Result<Self> {
        Self::new(ExecutorConfig::with_workers(num_workers))
    }

    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }

    /// Number of topologies currently in flight, across all graphs.
    pub fn num_topologies(&self) -> usize {
        self.tracker.active_topologies()
    }

    /// Run `graph` once.
    pub fn run(&self, graph: &Graph) -> RunFuture {
        self.submit(graph, RunMode::Times(1), None)
    }

    /// Run `graph` once, then call `callback`.
    pub fn run_with<C>(&self, graph: &Graph, callback: C) -> RunFuture
    where
        C: FnOnce() + Send + 'static,
    {
        self.submit(graph, RunMode::Times(1), Some(Box::new(callback)))
    }

    /// Run `graph` exactly `n` times, back to back.
    pub fn run_n(&self, graph: &Graph, n: usize) -> RunFuture {
        self.submit(graph, RunMode::Times(n), None)
    }

    /// Run `graph` exactly `n` times; `callback` fires once after the last.
    pub fn run_n_with<C>(&self, graph: &Graph, n: usize, callback: C) -> RunFuture
    where
        C: FnOnce() + Send + 'static,
    {
        self.submit(graph, RunMode::Times(n), Some(Box::new(callback)))
    }

    /// Run `graph` repeatedly until `predicate` returns `true`.
    ///
    /// The predicate is evaluated after each completed iteration, so the
    /// graph runs at least once.
    pub fn run_until<P>(&self, graph: &Graph, predicate: P) -> RunFuture
    where
        P: FnMut() -> bool + Send + 'static,
    {
        self.submit(graph, RunMode::Until(Box::new(predicate)), None)
    }

    /// [`run_until`](Executor::run_until) with a completion callback.
    pub fn run_until_with<P, C>(&self, graph: &Graph, predicate: P, callback: C) -> RunFuture
    where
        P: FnMut() -> bool + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.submit(
            graph,
            RunMode::Until(Box::new(predicate)),
            Some(Box::new(callback)),
        )
    }

    /// Block until every request submitted so far, on every graph, has
    /// completed.
    ///
    /// Must not be called from a task callable, predicate or callback of
    /// this executor.
    pub fn wait_for_all(&self) {
        self.tracker.wait_for_all();
    }

    fn submit(&self, graph: &Graph, mode: RunMode, callback: Option<Callback>) -> RunFuture {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (request, future) = RunRequest::new(id, graph.clone(), mode, callback);

        self.tracker.request_submitted();
        if let Err(mpsc::error::SendError(event)) = self.events.send(EngineEvent::RunRequested(request)) {
            warn!(request = id, "coordinator not running; abandoning request");
            if let EngineEvent::RunRequested(request) = event {
                request.complete(Err(RunError::Abandoned));
            }
            self.tracker.request_completed();
        }

        future
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.wait_for_all();

        if self.events.send(EngineEvent::ShutdownRequested).is_err() {
            debug!("coordinator already stopped");
        }
        if let Some(coordinator) = self.coordinator.take() {
            if coordinator.join().is_err() {
                warn!("coordinator thread panicked");
            }
        }
        // `pool` is dropped after this, joining the workers.
        info!("executor stopped");
    }
}
