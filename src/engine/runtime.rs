// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::exec::{PoolHandle, Topology};

use super::core::Coordinator;
use super::{CoordinatorCommand, EngineEvent};

/// Bookkeeping shared between the executor front-end and the coordinator
/// thread: outstanding requests (for `wait_for_all`) and active topologies.
#[derive(Debug, Default)]
pub(crate) struct RunTracker {
    outstanding: Mutex<usize>,
    all_done: Condvar,
    active_topologies: AtomicUsize,
}

impl RunTracker {
    pub(crate) fn request_submitted(&self) {
        *self.outstanding.lock() += 1;
    }

    pub(crate) fn request_completed(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until no request is outstanding.
    pub(crate) fn wait_for_all(&self) {
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            self.all_done.wait(&mut outstanding);
        }
    }

    pub(crate) fn active_topologies(&self) -> usize {
        self.active_topologies.load(Ordering::Acquire)
    }

    fn set_active_topologies(&self, n: usize) {
        self.active_topologies.store(n, Ordering::Release);
    }
}

/// Drives the [`Coordinator`] on its own thread.
///
/// This is a thin shell around the pure core: it reads [`EngineEvent`]s
/// from the channel, feeds them into the core, and executes the returned
/// commands (launch topologies on the pool, fire callbacks, resolve
/// futures). Callbacks and `run_until` predicates therefore run on this
/// thread.
pub(crate) struct Runtime {
    core: Coordinator,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    /// Handed to each topology so it can report completion.
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    pool: PoolHandle,
    tracker: Arc<RunTracker>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub(crate) fn new(
        events_rx: mpsc::UnboundedReceiver<EngineEvent>,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
        pool: PoolHandle,
        tracker: Arc<RunTracker>,
    ) -> Self {
        Self {
            core: Coordinator::new(),
            events_rx,
            events_tx,
            pool,
            tracker,
        }
    }

    /// Main event loop; returns after `ShutdownRequested`.
    pub(crate) fn run(mut self) {
        info!("coordinator started");

        while let Some(event) = self.events_rx.blocking_recv() {
            trace!(?event, "coordinator received event");

            let step = self.core.step(event);
            // Published before completions so `wait_for_all` never observes
            // a stale count.
            self.tracker.set_active_topologies(self.core.num_active());
            for command in step.commands {
                self.execute_command(command);
            }

            if !step.keep_running {
                info!("shutdown requested; stopping coordinator");
                break;
            }
        }

        for command in self.core.abandon_all() {
            self.execute_command(command);
        }
        self.tracker.set_active_topologies(0);

        info!("coordinator exiting");
    }

    fn execute_command(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::LaunchTopology {
                graph,
                request,
                iteration,
            } => {
                debug!(request, iteration, graph = %graph.id(), "launching iteration");
                Topology::launch(&graph, iteration, self.events_tx.clone(), &self.pool);
            }
            CoordinatorCommand::CompleteRequest { request, outcome } => {
                request.complete(outcome);
                self.tracker.request_completed();
            }
        }
    }
}
