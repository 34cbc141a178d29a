// src/engine/future.rs

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::errors::RunError;

/// Completion handle of a run-family request.
///
/// Resolves once, after the last iteration of the request (including any
/// detached subflow work) has finished, or after the request failed.
///
/// Blocking callers use [`wait`](RunFuture::wait); async callers `.await`
/// it directly.
#[derive(Debug)]
pub struct RunFuture {
    rx: oneshot::Receiver<Result<(), RunError>>,
}

impl RunFuture {
    pub(crate) fn new(rx: oneshot::Receiver<Result<(), RunError>>) -> Self {
        Self { rx }
    }

    /// Block the calling thread until the request completes.
    ///
    /// Must not be called from inside an async runtime (use `.await`
    /// there) or from inside a task callable of the same executor.
    pub fn wait(self) -> Result<(), RunError> {
        self.rx.blocking_recv().unwrap_or(Err(RunError::Abandoned))
    }

    /// Non-blocking check. Returns `None` while the request is still
    /// running; once it returns `Some`, the outcome has been consumed.
    pub fn try_wait(&mut self) -> Option<Result<(), RunError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(RunError::Abandoned)),
        }
    }
}

impl Future for RunFuture {
    type Output = Result<(), RunError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RunError::Abandoned)))
    }
}
