// src/exec/mod.rs

//! Execution layer.
//!
//! - [`pool`] owns the fixed set of worker threads and the shared
//!   ready-queue they pull from.
//! - [`topology`] is one scheduling pass over a graph: per-node in-degree
//!   counters, job execution, failure recording and subflow spawning.
//!
//! Task callables run synchronously on whichever worker dequeued them. The
//! only engine-side suspension point is a worker waiting for a joined
//! subflow, and that worker keeps executing ready jobs while it waits.

pub(crate) mod pool;
pub(crate) mod topology;

pub(crate) use pool::{PoolHandle, WorkerPool};
pub(crate) use topology::Topology;
