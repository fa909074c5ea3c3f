//! Handle to the result of a submitted retry execution.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use quickretry_core::{RetryError, RetryResult};

/// Await or poll the outcome of [`RetryExecutor::submit`](super::RetryExecutor::submit).
///
/// The result is delivered exactly once. If the worker running the retry loop
/// goes away first (pool shut down, work unit panicked) the handle yields
/// [`RetryError::Disconnected`].
#[derive(Debug)]
pub struct JobHandle<T> {
    receiver: Receiver<RetryResult<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(receiver: Receiver<RetryResult<T>>) -> Self {
        Self { receiver }
    }

    /// Block until the retry loop finishes.
    pub fn wait(self) -> RetryResult<T> {
        self.receiver
            .recv()
            .unwrap_or(Err(RetryError::Disconnected))
    }

    /// Block for at most `timeout`; `None` means the loop is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RetryResult<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(RetryError::Disconnected)),
        }
    }

    /// Poll without blocking; `None` means the loop is still running.
    pub fn try_result(&self) -> Option<RetryResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RetryError::Disconnected)),
        }
    }
}
