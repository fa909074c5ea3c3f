//! Retry loop: run a work unit under a policy, synchronously or on a pool.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use quickretry_core::{AttemptRecord, RetryError, RetryPolicy, RetryResult};

use super::handle::JobHandle;
use super::pool::WorkerPool;

/// Result of one retry loop, with its attempt history.
#[derive(Debug)]
pub struct RetryReport<T> {
    /// The successful value, or [`RetryError::Exhausted`] carrying the last failure.
    pub outcome: RetryResult<T>,
    /// Invocations of the work unit (first try included).
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// One record per failed attempt, oldest first.
    pub failures: Vec<AttemptRecord>,
}

impl<T> RetryReport<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs work units under a [`RetryPolicy`].
///
/// Attempts of a single loop are strictly sequential. The delay is a plain
/// thread sleep: it ties up the calling thread (or pool worker) for its
/// duration. A loop cannot be cancelled once it has started.
#[derive(Debug)]
pub struct RetryExecutor;

impl RetryExecutor {
    /// Run `work` up to `policy.total_attempts()` times on the calling thread.
    ///
    /// Returns the first successful value. When every attempt fails the last
    /// failure is propagated inside [`RetryError::Exhausted`].
    pub fn execute<T, F>(work: F, policy: &RetryPolicy) -> RetryResult<T>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        Self::run(work, policy).outcome
    }

    /// Like [`execute`](Self::execute), but also report attempts and failures.
    pub fn run<T, F>(mut work: F, policy: &RetryPolicy) -> RetryReport<T>
    where
        F: FnMut() -> anyhow::Result<T>,
    {
        let started_at = Utc::now();
        let started = Instant::now();
        let total_attempts = policy.total_attempts();
        let mut failures = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match work() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "work unit succeeded after retrying");
                    }
                    return RetryReport {
                        outcome: Ok(value),
                        attempts: attempt,
                        started_at,
                        elapsed: started.elapsed(),
                        failures,
                    };
                }
                Err(error) => {
                    let record = AttemptRecord::new(attempt, &error);
                    warn!(
                        attempt,
                        total_attempts,
                        error = %record.error,
                        "work unit failed"
                    );
                    failures.push(record);

                    if attempt >= total_attempts {
                        warn!(attempts = attempt, "retry attempts exhausted");
                        return RetryReport {
                            outcome: Err(RetryError::Exhausted {
                                attempts: attempt,
                                last_error: error,
                            }),
                            attempts: attempt,
                            started_at,
                            elapsed: started.elapsed(),
                            failures,
                        };
                    }

                    if !policy.delay().is_zero() {
                        thread::sleep(policy.delay());
                    }
                }
            }
        }
    }

    /// Schedule [`execute`](Self::execute) on `pool` and return a handle to its result.
    ///
    /// Fails with [`RetryError::InvalidArgument`] when no pool is supplied, in
    /// which case `work` is never invoked. Never blocks: a saturated pool
    /// rejects the submission with [`RetryError::Rejected`].
    pub fn submit<T, F>(
        work: F,
        policy: &RetryPolicy,
        pool: Option<&WorkerPool>,
    ) -> RetryResult<JobHandle<T>>
    where
        F: FnMut() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        Self::submit_with_callback(work, policy, pool, move |report| {
            // The caller may have dropped the handle; nobody to tell then.
            let _ = tx.send(report.outcome);
        })?;
        Ok(JobHandle::new(rx))
    }

    /// Schedule [`run`](Self::run) on `pool` and hand its report to `on_complete`.
    ///
    /// `on_complete` runs on the worker thread right after the loop finishes.
    pub fn submit_with_callback<T, F, C>(
        work: F,
        policy: &RetryPolicy,
        pool: Option<&WorkerPool>,
        on_complete: C,
    ) -> RetryResult<()>
    where
        F: FnMut() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
        C: FnOnce(RetryReport<T>) + Send + 'static,
    {
        let pool = pool.ok_or_else(|| {
            RetryError::invalid_argument("a worker pool is required for asynchronous retry")
        })?;
        let policy = *policy;

        pool.execute(move || on_complete(Self::run(work, &policy)))?;
        debug!(pool = %pool.name(), "retry loop submitted");
        Ok(())
    }
}
