// src/engine/mod.rs

//! Run-family orchestration.
//!
//! This module ties together:
//! - the per-graph run queue (requests against one graph never overlap and
//!   start in arrival order)
//! - the pure coordinator state machine deciding, after each finished
//!   topology, whether to iterate again, complete the request, or start the
//!   next queued request
//! - the coordinator thread that feeds events into the core and executes the
//!   resulting commands
//! - the public [`Executor`] and the [`RunFuture`] it hands out
//!
//! The pure core lives in [`core`]; the threaded shell in [`runtime`].

use std::fmt;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::dag::Graph;
use crate::errors::{RunError, panic_message};
use crate::types::GraphId;

pub mod core;
pub mod executor;
pub mod future;
pub mod queue;
pub(crate) mod runtime;

pub use self::core::{CoordinatorCommand, CoreStep, Coordinator};
pub use executor::Executor;
pub use future::RunFuture;
pub use queue::RunQueue;

/// Stop condition evaluated after each completed iteration of `run_until`.
pub type Predicate = Box<dyn FnMut() -> bool + Send>;

/// Completion callback of a run-family request.
pub type Callback = Box<dyn FnOnce() + Send>;

/// How many times a graph is run for one request.
pub enum RunMode {
    /// Exactly `n` iterations.
    Times(usize),
    /// Until the predicate returns `true`; at least one iteration.
    Until(Predicate),
}

impl fmt::Debug for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Times(n) => f.debug_tuple("Times").field(n).finish(),
            RunMode::Until(_) => f.write_str("Until(..)"),
        }
    }
}

/// A queued run-family request.
pub struct RunRequest {
    pub id: u64,
    pub graph: Graph,
    pub mode: RunMode,
    callback: Option<Callback>,
    promise: oneshot::Sender<Result<(), RunError>>,
}

impl fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRequest")
            .field("id", &self.id)
            .field("graph", &self.graph.id())
            .field("mode", &self.mode)
            .field("has_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl RunRequest {
    pub fn new(
        id: u64,
        graph: Graph,
        mode: RunMode,
        callback: Option<Callback>,
    ) -> (Self, RunFuture) {
        let (promise, rx) = oneshot::channel();
        let request = Self {
            id,
            graph,
            mode,
            callback,
            promise,
        };
        (request, RunFuture::new(rx))
    }

    pub fn graph_id(&self) -> GraphId {
        self.graph.id()
    }

    /// Fire the callback (if any), then resolve the future.
    ///
    /// The callback runs first so its side effects are visible to whoever
    /// is waiting on the future.
    pub fn complete(self, outcome: Result<(), RunError>) {
        if let Some(callback) = self.callback {
            if let Err(payload) =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback))
            {
                warn!(
                    request = self.id,
                    message = %panic_message(payload.as_ref()),
                    "run callback panicked"
                );
            }
        }

        if self.promise.send(outcome).is_err() {
            debug!(request = self.id, "run future dropped before completion");
        }
    }
}

/// Events flowing into the coordinator.
#[derive(Debug)]
pub enum EngineEvent {
    /// A client submitted a run-family request.
    RunRequested(RunRequest),
    /// Every node of the graph's current topology has finished.
    TopologyFinished {
        graph: GraphId,
        outcome: Result<(), RunError>,
    },
    /// The executor is shutting down.
    ShutdownRequested,
}
