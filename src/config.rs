// src/config.rs

//! Executor configuration.
//!
//! Hosts either build an [`ExecutorConfig`] in code, deserialize it as part
//! of their own config file (all fields have defaults), or read it from the
//! environment with [`ExecutorConfig::from_env`].

use serde::Deserialize;

use crate::errors::{Result, RundagError};

/// Configuration for [`Executor`](crate::engine::Executor).
///
/// ```toml
/// num_workers = 8
/// thread_name_prefix = "rundag-worker"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Number of worker threads in the pool. Must be >= 1.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Prefix for worker thread names; the worker index is appended.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_num_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_thread_name_prefix() -> String {
    "rundag-worker".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl ExecutorConfig {
    /// Config with an explicit worker count and default everything else.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Read the configuration from environment variables.
    ///
    /// - `RUNDAG_NUM_WORKERS`: worker thread count
    /// - `RUNDAG_THREAD_PREFIX`: worker thread name prefix
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let num_workers = lookup("RUNDAG_NUM_WORKERS")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or_else(default_num_workers);

        let thread_name_prefix = lookup("RUNDAG_THREAD_PREFIX")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_thread_name_prefix);

        Self {
            num_workers,
            thread_name_prefix,
        }
    }

    /// Reject configurations the executor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(RundagError::Config(
                "num_workers must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(())
    }
}
