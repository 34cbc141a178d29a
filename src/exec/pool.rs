// src/exec/pool.rs

//! Fixed-size worker pool sharing one ready-queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::config::ExecutorConfig;
use crate::errors::Result;
use crate::exec::topology::{Frame, Job};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
}

/// Cloneable access to the ready-queue, held by jobs and the coordinator.
#[derive(Clone)]
pub(crate) struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Push ready jobs and wake every waiter.
    ///
    /// A worker in [`corun`](PoolHandle::corun) only accepts jobs of its own
    /// subflow, so a single wakeup could land on a thread that skips the job.
    pub(crate) fn schedule(&self, jobs: Vec<Job>) {
        if jobs.is_empty() {
            return;
        }

        self.shared.state.lock().ready.extend(jobs);
        self.shared.available.notify_all();
    }

    /// Execute ready jobs of `frame` (and of subflows nested in it) on the
    /// calling thread until `frame` has drained.
    ///
    /// Used by a worker waiting for a joined subflow: instead of blocking
    /// idle it helps drain that subflow, so a pool of one worker can still
    /// make progress on nested work. Jobs of unrelated frames are left to
    /// other workers, which bounds the nesting on this thread's stack by the
    /// subflow depth.
    pub(crate) fn corun(&self, frame: &Frame) {
        let mut state = self.shared.state.lock();
        loop {
            if frame.is_drained() {
                return;
            }

            let own = state.ready.iter().position(|job| job.is_within(frame));
            let job = own.and_then(|index| state.ready.remove(index));
            match job {
                Some(job) => {
                    drop(state);
                    job.run(self);
                    state = self.shared.state.lock();
                }
                None => self.shared.available.wait(&mut state),
            }
        }
    }

    /// Wake every thread blocked on the queue, e.g. after a joined subflow
    /// drained so its waiter re-checks its condition.
    pub(crate) fn wake_all(&self) {
        // Taking the lock orders this wakeup after any waiter's condition check.
        let _guard = self.shared.state.lock();
        self.shared.available.notify_all();
    }
}

/// Owns the worker threads.
pub(crate) struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.num_workers` threads.
    pub(crate) fn start(config: &ExecutorConfig) -> Result<Self> {
        let handle = PoolHandle {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                available: Condvar::new(),
            }),
        };

        let mut pool = Self {
            handle,
            workers: Vec::with_capacity(config.num_workers),
        };

        for id in 0..config.num_workers {
            let worker_handle = pool.handle.clone();
            // On spawn failure `pool` is dropped, which stops the workers
            // already started.
            let join = thread::Builder::new()
                .name(format!("{}-{id}", config.thread_name_prefix))
                .spawn(move || worker_loop(id, worker_handle))?;
            pool.workers.push(join);
        }

        info!(num_workers = config.num_workers, "worker pool started");
        Ok(pool)
    }

    pub(crate) fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.workers.len()
    }

    fn shutdown(&mut self) {
        {
            let mut state = self.handle.shared.state.lock();
            state.shutdown = true;
        }
        self.handle.shared.available.notify_all();

        for join in self.workers.drain(..) {
            if join.join().is_err() {
                debug!("worker thread panicked outside of a task");
            }
        }
        info!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, pool: PoolHandle) {
    debug!(worker = id, "worker started");

    loop {
        let job = {
            let mut state = pool.shared.state.lock();
            loop {
                if let Some(job) = state.ready.pop_front() {
                    break Some(job);
                }
                if state.shutdown {
                    break None;
                }
                pool.shared.available.wait(&mut state);
            }
        };

        match job {
            Some(job) => {
                trace!(worker = id, "worker picked up job");
                job.run(&pool);
            }
            None => break,
        }
    }

    debug!(worker = id, "worker exiting");
}
