// src/engine/core.rs

//! Pure coordinator state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`EngineEvent`]s and produces:
//! - an updated set of per-graph run queues
//! - a list of commands describing what the threaded shell should do next
//!
//! The shell (`engine::runtime`) is responsible for:
//! - reading events from the channel
//! - launching topologies on the worker pool
//! - firing callbacks and resolving futures
//!
//! The core has no threads, channels or worker pool and can be unit tested
//! on its own.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, info, warn};

use crate::dag::Graph;
use crate::engine::queue::RunQueue;
use crate::engine::{EngineEvent, RunMode, RunRequest};
use crate::errors::{RunError, panic_message};
use crate::types::GraphId;

/// Command produced by the core, to be executed by the shell.
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Start the next topology of `graph`.
    LaunchTopology {
        graph: Graph,
        request: u64,
        /// Zero-based iteration number within the request.
        iteration: usize,
    },
    /// The request is done; fire its callback and resolve its future.
    CompleteRequest {
        request: RunRequest,
        outcome: Result<(), RunError>,
    },
}

/// Decision returned by the core after handling a single event.
#[derive(Debug)]
pub struct CoreStep {
    pub commands: Vec<CoordinatorCommand>,
    /// Whether the coordinator loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoordinatorCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// What to do with the active request after one of its iterations.
enum Next {
    Iterate,
    Finish(Result<(), RunError>),
}

/// Per-graph run queues plus the run-mode protocol.
#[derive(Debug, Default)]
pub struct Coordinator {
    queues: HashMap<GraphId, RunQueue>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no request is active or waiting on any graph.
    pub fn is_idle(&self) -> bool {
        self.queues.values().all(RunQueue::is_empty)
    }

    /// Number of graphs with a topology in flight.
    pub fn num_active(&self) -> usize {
        self.queues.values().filter(|q| !q.is_idle()).count()
    }

    /// Requests waiting behind the active one for `graph`.
    pub fn pending_for(&self, graph: GraphId) -> usize {
        self.queues.get(&graph).map_or(0, RunQueue::pending_len)
    }

    /// Handle a single event, returning the commands for the shell.
    pub fn step(&mut self, event: EngineEvent) -> CoreStep {
        match event {
            EngineEvent::RunRequested(request) => self.handle_request(request),
            EngineEvent::TopologyFinished { graph, outcome } => {
                self.handle_topology_finished(graph, outcome)
            }
            EngineEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    /// Complete every remaining request with [`RunError::Abandoned`].
    pub fn abandon_all(&mut self) -> Vec<CoordinatorCommand> {
        let commands: Vec<CoordinatorCommand> = self
            .queues
            .drain()
            .flat_map(|(_, mut queue)| queue.drain_all())
            .map(|request| CoordinatorCommand::CompleteRequest {
                request,
                outcome: Err(RunError::Abandoned),
            })
            .collect();

        if !commands.is_empty() {
            warn!(abandoned = commands.len(), "abandoning unfinished run requests");
        }
        commands
    }

    fn handle_request(&mut self, request: RunRequest) -> CoreStep {
        if matches!(request.mode, RunMode::Times(0)) {
            debug!(request = request.id, "zero-iteration request completes immediately");
            return CoreStep::running(vec![CoordinatorCommand::CompleteRequest {
                request,
                outcome: Ok(()),
            }]);
        }

        info!(
            request = request.id,
            graph = %request.graph_id(),
            mode = ?request.mode,
            "run request received"
        );

        let graph = request.graph_id();
        let queue = self.queues.entry(graph).or_default();
        queue.push(request);

        CoreStep::running(Self::start_next(queue).into_iter().collect())
    }

    fn handle_topology_finished(
        &mut self,
        graph: GraphId,
        outcome: Result<(), RunError>,
    ) -> CoreStep {
        let Some(queue) = self.queues.get_mut(&graph) else {
            warn!(graph = %graph, "topology finished for unknown graph; ignoring");
            return CoreStep::running(Vec::new());
        };

        let Some(active) = queue.active_mut() else {
            warn!(graph = %graph, "topology finished with no active request; ignoring");
            return CoreStep::running(Vec::new());
        };

        active.iterations += 1;
        let iterations = active.iterations;

        let next = match outcome {
            Err(error) => Next::Finish(Err(error)),
            Ok(()) => match &mut active.request.mode {
                RunMode::Times(n) if iterations >= *n => Next::Finish(Ok(())),
                RunMode::Times(_) => Next::Iterate,
                RunMode::Until(predicate) => {
                    match catch_unwind(AssertUnwindSafe(|| predicate())) {
                        Ok(true) => Next::Finish(Ok(())),
                        Ok(false) => Next::Iterate,
                        Err(payload) => Next::Finish(Err(RunError::PredicatePanicked {
                            message: panic_message(payload.as_ref()),
                        })),
                    }
                }
            },
        };

        let mut commands = Vec::new();

        match next {
            Next::Iterate => {
                commands.push(CoordinatorCommand::LaunchTopology {
                    graph: active.request.graph.clone(),
                    request: active.request.id,
                    iteration: iterations,
                });
            }
            Next::Finish(outcome) => {
                if let Some(request) = queue.finish_active() {
                    info!(
                        request = request.id,
                        graph = %graph,
                        iterations,
                        success = outcome.is_ok(),
                        "run request finished"
                    );
                    commands.push(CoordinatorCommand::CompleteRequest { request, outcome });
                }

                commands.extend(Self::start_next(queue));

                if queue.is_empty() {
                    self.queues.remove(&graph);
                }
            }
        }

        CoreStep::running(commands)
    }

    /// Activate the oldest waiting request if the graph is idle.
    fn start_next(queue: &mut RunQueue) -> Option<CoordinatorCommand> {
        let active = queue.activate_next()?;
        Some(CoordinatorCommand::LaunchTopology {
            graph: active.request.graph.clone(),
            request: active.request.id,
            iteration: 0,
        })
    }
}
