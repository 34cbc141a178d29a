// src/errors.rs

//! Crate-wide error types.
//!
//! - [`RundagError`] covers building and configuring (bad config, opt-in
//!   cycle check).
//! - [`RunError`] is what a [`RunFuture`](crate::engine::RunFuture) resolves
//!   to when a run-family request fails.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RundagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cycle detected in graph: {0}")]
    Cycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a run-family request.
///
/// The first failure inside a topology wins; every later node of that
/// topology is skipped, and the request stops iterating.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("task '{task}' panicked: {message}")]
    TaskPanicked { task: String, message: String },

    #[error("run_until predicate panicked: {message}")]
    PredicatePanicked { message: String },

    #[error("executor shut down before the run completed")]
    Abandoned,
}

impl RunError {
    /// Name of the task that failed, if the failure came from a task.
    pub fn task(&self) -> Option<&str> {
        match self {
            RunError::TaskFailed { task, .. } | RunError::TaskPanicked { task, .. } => {
                Some(task.as_str())
            }
            RunError::PredicatePanicked { .. } | RunError::Abandoned => None,
        }
    }
}

/// Render a `catch_unwind` payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RundagError>;
