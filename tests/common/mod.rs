#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rundag::Executor;

pub use rundag_test_utils::builders;
pub use rundag_test_utils::recorder::{Event, ExecutionRecorder};
pub use rundag_test_utils::{init_tracing, with_timeout};

pub fn executor(num_workers: usize) -> Executor {
    init_tracing();
    Executor::with_workers(num_workers).expect("executor starts")
}

/// Shared counter plus a task callable that bumps it.
pub fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn load(count: &AtomicUsize) -> usize {
    count.load(Ordering::SeqCst)
}
