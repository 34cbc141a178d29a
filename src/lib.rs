// src/lib.rs

//! `rundag`: build a task-dependency graph once, run it many times.
//!
//! - [`dag`]: the client-built [`Graph`], [`Task`] handles, dynamic
//!   [`Subflow`]s and the read-only [`GraphView`] traversal.
//! - `exec`: fixed worker pool and per-run topologies (crate-internal).
//! - [`engine`]: the run-family protocol (`run`, `run_n`, `run_until`),
//!   per-graph serialization and the public [`Executor`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use rundag::{Executor, Graph, Subflow};
//!
//! let executor = Executor::with_workers(4)?;
//! let graph = Graph::with_name("diamond");
//!
//! let a = graph.emplace(|| println!("A")).named("A");
//! let b = graph.emplace(|| println!("B")).named("B");
//! let c = graph
//!     .emplace_subflow(|sf: &mut Subflow| {
//!         sf.emplace(|| println!("C1"));
//!         sf.emplace(|| println!("C2"));
//!     })
//!     .named("C");
//! let d = graph.emplace(|| println!("D")).named("D");
//! a.precede([&b, &c]);
//! d.succeed([&b, &c]);
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&runs);
//! executor
//!     .run_until(&graph, move || counter.fetch_add(1, Ordering::SeqCst) + 1 == 3)
//!     .wait()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub(crate) mod exec;
pub mod logging;
pub mod types;

pub use config::ExecutorConfig;
pub use dag::{Graph, GraphView, NodeView, Subflow, Task, WorkKind};
pub use engine::{Executor, RunFuture};
pub use errors::{RunError, RundagError};
pub use types::{GraphId, IntoTaskResult, TaskResult};
