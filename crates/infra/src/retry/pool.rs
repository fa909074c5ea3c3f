//! Fixed-size worker pool with a bounded queue.
//!
//! Submission never blocks: when the queue is full the task is rejected and the
//! caller decides what to do. Shutting the pool down closes the queue, lets the
//! workers drain what was already accepted and joins them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, error};

use quickretry_core::{RetryError, RetryResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool of named worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    queue_capacity: usize,
    sender: Option<SyncSender<Task>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing a queue of at most `queue_capacity` pending tasks.
    pub fn new(name: impl Into<String>, size: usize, queue_capacity: usize) -> RetryResult<Self> {
        if size == 0 {
            return Err(RetryError::invalid_argument("worker pool size must be at least 1"));
        }
        if queue_capacity == 0 {
            return Err(RetryError::invalid_argument(
                "worker pool queue capacity must be at least 1",
            ));
        }

        let name = name.into();
        let (sender, receiver) = mpsc::sync_channel::<Task>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        // Workers spawned before a failure exit once `sender` is dropped.
        let workers = (0..size)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let worker_name = format!("{name}-{index}");
                thread::Builder::new()
                    .name(worker_name.clone())
                    .spawn(move || worker_loop(&worker_name, &receiver))
                    .map_err(|err| {
                        RetryError::rejected(format!(
                            "pool '{name}' could not spawn worker {index}: {err}"
                        ))
                    })
            })
            .collect::<RetryResult<Vec<_>>>()?;

        debug!(pool = %name, size, queue_capacity, "worker pool started");

        Ok(Self {
            name,
            queue_capacity,
            sender: Some(sender),
            workers,
        })
    }

    /// Queue `task` for execution on one of the workers.
    pub fn execute<F>(&self, task: F) -> RetryResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RetryError::rejected(format!("pool '{}' is shut down", self.name)))?;

        sender.try_send(Box::new(task)).map_err(|err| match err {
            TrySendError::Full(_) => RetryError::rejected(format!(
                "pool '{}' queue is full ({} pending tasks)",
                self.name, self.queue_capacity
            )),
            TrySendError::Disconnected(_) => {
                RetryError::rejected(format!("pool '{}' is shut down", self.name))
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Stop accepting work, finish queued tasks and join every worker.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        // Workers exit once the queue is both closed and empty.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!(pool = %self.name, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.close();
        }
    }
}

fn worker_loop(name: &str, queue: &Mutex<Receiver<Task>>) {
    loop {
        let next = match queue.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };

        match next {
            Ok(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!(worker = name, "retry task panicked");
                }
            }
            Err(_) => break,
        }
    }
}
