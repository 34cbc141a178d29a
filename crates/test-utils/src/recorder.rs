use std::sync::Arc;

use parking_lot::Mutex;

/// One observation made by a recording task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// Thread-safe, globally ordered log of task start/end events.
///
/// Clones share the same log, so a recorder can be captured by any number of
/// task closures and inspected after the run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRecorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, name: &str) {
        self.events.lock().push(Event::Start(name.to_string()));
    }

    pub fn end(&self, name: &str) {
        self.events.lock().push(Event::End(name.to_string()));
    }

    /// A task callable that records its start and end under `name`.
    pub fn task(&self, name: &str) -> impl FnMut() + Send + 'static {
        let recorder = self.clone();
        let name = name.to_string();
        move || {
            recorder.start(&name);
            std::thread::yield_now();
            recorder.end(&name);
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Task names in the order they started.
    pub fn started(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Start(name) => Some(name.clone()),
                Event::End(_) => None,
            })
            .collect()
    }

    /// How many times `name` started.
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::Start(n) if n == name))
            .count()
    }

    /// Whether the first end of `a` is logged before the first start of `b`.
    pub fn finished_before(&self, a: &str, b: &str) -> bool {
        let events = self.events.lock();
        let end_a = events
            .iter()
            .position(|e| matches!(e, Event::End(n) if n == a));
        let start_b = events
            .iter()
            .position(|e| matches!(e, Event::Start(n) if n == b));
        matches!((end_a, start_b), (Some(x), Some(y)) if x < y)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
