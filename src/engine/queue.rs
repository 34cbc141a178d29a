// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::debug;

use super::RunRequest;

/// The request currently iterating on a graph.
#[derive(Debug)]
pub struct ActiveRun {
    pub request: RunRequest,
    /// Iterations completed so far.
    pub iterations: usize,
}

/// FIFO of run-family requests for a single graph.
///
/// Semantics:
/// - At most one request is active; only the active request has a topology
///   in flight, so runs of the same graph never overlap.
/// - Requests arriving while one is active wait in arrival order and are
///   activated one at a time once the active request completes.
#[derive(Debug, Default)]
pub struct RunQueue {
    active: Option<ActiveRun>,
    pending: VecDeque<RunRequest>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no request is active.
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Returns true if nothing is active or waiting.
    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active(&self) -> Option<&ActiveRun> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveRun> {
        self.active.as_mut()
    }

    /// Append a request behind everything already queued.
    pub fn push(&mut self, request: RunRequest) {
        debug!(
            request = request.id,
            graph = %request.graph_id(),
            waiting = self.pending.len(),
            active = self.active.is_some(),
            "queued run request"
        );
        self.pending.push_back(request);
    }

    /// Take the active request out, leaving the queue idle.
    pub fn finish_active(&mut self) -> Option<RunRequest> {
        self.active.take().map(|run| run.request)
    }

    /// If idle, promote the oldest waiting request to active.
    pub fn activate_next(&mut self) -> Option<&ActiveRun> {
        if self.active.is_some() {
            return None;
        }
        let request = self.pending.pop_front()?;
        debug!(request = request.id, graph = %request.graph_id(), "activating run request");
        self.active = Some(ActiveRun {
            request,
            iterations: 0,
        });
        self.active.as_ref()
    }

    /// Remove every request, active first, then waiting in order.
    pub fn drain_all(&mut self) -> Vec<RunRequest> {
        let mut all: Vec<RunRequest> = self.finish_active().into_iter().collect();
        all.extend(self.pending.drain(..));
        all
    }
}
