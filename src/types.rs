use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result type every task callable is reduced to.
pub type TaskResult = anyhow::Result<()>;

/// Process-unique identity of a [`Graph`](crate::dag::Graph).
///
/// Clones of a graph handle share the same id; the run coordinator keys its
/// per-graph run queues on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GraphId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// Conversion from whatever a task callable returns into a [`TaskResult`].
///
/// Lets callables be written either as plain `|| { ... }` closures or as
/// fallible ones returning `Result<(), E>`.
pub trait IntoTaskResult {
    fn into_task_result(self) -> TaskResult;
}

impl IntoTaskResult for () {
    fn into_task_result(self) -> TaskResult {
        Ok(())
    }
}

impl<E> IntoTaskResult for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_task_result(self) -> TaskResult {
        self.map_err(Into::into)
    }
}
