use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use quickretry_events::Subscription;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Generic subscriber loop.
///
/// - Drains one bus subscription on a dedicated thread, in delivery order
/// - Handler failures and panics are logged; they never reach the publisher
/// - Stops on shutdown request or when the bus goes away
#[derive(Debug)]
pub struct SubscriberWorker;

impl SubscriberWorker {
    /// Spawn a worker thread that feeds every message on `sub` to `handler`.
    ///
    /// `tick` bounds how long a shutdown request can go unnoticed while idle.
    pub fn spawn<M, H, E>(
        name: impl Into<String>,
        sub: Subscription<M>,
        tick: Duration,
        mut handler: H,
    ) -> WorkerHandle
    where
        M: Send + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_name = name.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&thread_name, sub, shutdown_rx, tick, &mut handler))
            .expect("failed to spawn subscriber worker thread");

        WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn worker_loop<M, H, E>(
    name: &str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    tick: Duration,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: Display,
{
    debug!(worker = name, "subscriber worker started");

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                match panic::catch_unwind(AssertUnwindSafe(|| handler(msg))) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(worker = name, error = %err, "subscriber handler failed")
                    }
                    Err(_) => error!(worker = name, "subscriber handler panicked"),
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker = name, "subscriber worker stopped");
}
