//! Standard retry job consumer.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use quickretry_core::{RetryError, RetryResult};
use quickretry_events::{JobStatus, RetryJob};

use crate::config::DispatcherConfig;
use crate::retry::{RetryExecutor, RetryReport, WorkerPool};

/// Something that can be registered on a [`RetryDispatcher`](super::RetryDispatcher).
///
/// Errors returned here are logged on the consumer thread. They never reach
/// whoever posted the job.
pub trait RetryJobHandler: Send + 'static {
    fn on_retry_job(&self, job: RetryJob) -> RetryResult<()>;
}

/// Processor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub jobs_received: u64,
    pub jobs_succeeded: u64,
    pub jobs_exhausted: u64,
    pub jobs_rejected: u64,
    pub jobs_lost: u64,
}

/// Shared view of a processor's statistics, usable after registration.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<ProcessorStats>>,
}

impl StatsHandle {
    pub fn snapshot(&self) -> ProcessorStats {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut ProcessorStats)) {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *stats);
    }

    fn record(&self, status: &JobStatus) {
        self.update(|s| match status {
            JobStatus::Succeeded { .. } => s.jobs_succeeded += 1,
            JobStatus::Exhausted { .. } => s.jobs_exhausted += 1,
            JobStatus::Rejected { .. } => s.jobs_rejected += 1,
            JobStatus::Lost => s.jobs_lost += 1,
        });
    }
}

/// Executes retry jobs: synchronous jobs inline on the consumer thread,
/// asynchronous ones on an owned worker pool.
///
/// The pool lives exactly as long as the processor, so unregistering the
/// processor drains and stops it.
#[derive(Debug)]
pub struct RetryProcessor {
    pool: WorkerPool,
    stats: StatsHandle,
}

impl RetryProcessor {
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            pool,
            stats: StatsHandle::default(),
        }
    }

    /// Build a processor with a pool sized from `config`.
    pub fn from_config(config: &DispatcherConfig) -> RetryResult<Self> {
        let pool = WorkerPool::new(
            format!("{}-worker", config.name),
            config.pool_size,
            config.queue_capacity,
        )?;
        Ok(Self::new(pool))
    }

    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn submit(&self, job: RetryJob) -> RetryResult<()> {
        let policy = job.policy();
        let work = job.work();
        let stats = self.stats.clone();
        let job_id = job.id();
        let guard = OutcomeGuard::new(job.clone(), stats.clone());

        let submitted = RetryExecutor::submit_with_callback(
            move || work(),
            &policy,
            Some(&self.pool),
            move |report| {
                let status = job_status(&report);
                log_finished(&guard.job, &status);
                guard.complete(status);
            },
        );

        if let Err(err) = submitted {
            warn!(job_id = %job_id, error = %err, "retry job rejected");
            let status = JobStatus::Rejected {
                reason: err.to_string(),
            };
            stats.record(&status);
            job.report(status);
            return Err(err);
        }

        debug!(job_id = %job_id, "retry job submitted to pool");
        Ok(())
    }

    fn execute(&self, job: RetryJob) -> RetryResult<()> {
        let work = job.work();
        let policy = job.policy();

        // A panicking work unit must not take the consumer thread down with it.
        let report = match panic::catch_unwind(AssertUnwindSafe(move || {
            RetryExecutor::run(move || work(), &policy)
        })) {
            Ok(report) => report,
            Err(_) => {
                warn!(job_id = %job.id(), "retry job lost: work unit panicked");
                self.stats.record(&JobStatus::Lost);
                job.report(JobStatus::Lost);
                return Err(RetryError::Disconnected);
            }
        };
        let status = job_status(&report);

        log_finished(&job, &status);
        self.stats.record(&status);
        job.report(status);

        report.outcome.map(|_| ())
    }
}

impl RetryJobHandler for RetryProcessor {
    fn on_retry_job(&self, job: RetryJob) -> RetryResult<()> {
        self.stats.update(|s| s.jobs_received += 1);
        debug!(
            job_id = %job.id(),
            is_async = job.is_async(),
            max_attempts = job.policy().max_attempts(),
            "handling retry job"
        );

        if job.is_async() {
            self.submit(job)
        } else {
            self.execute(job)
        }
    }
}

fn job_status(report: &RetryReport<JsonValue>) -> JobStatus {
    match &report.outcome {
        Ok(value) => JobStatus::Succeeded {
            value: value.clone(),
            attempts: report.attempts,
        },
        Err(RetryError::Exhausted {
            attempts,
            last_error,
        }) => JobStatus::Exhausted {
            attempts: *attempts,
            last_error: format!("{last_error:#}"),
        },
        // `run` only fails with `Exhausted`; anything else means the result is gone.
        Err(_) => JobStatus::Lost,
    }
}

fn log_finished(job: &RetryJob, status: &JobStatus) {
    match status {
        JobStatus::Succeeded { attempts, .. } => {
            info!(job_id = %job.id(), attempts, "retry job succeeded")
        }
        JobStatus::Exhausted {
            attempts,
            last_error,
        } => warn!(job_id = %job.id(), attempts, error = %last_error, "retry job exhausted"),
        JobStatus::Rejected { .. } | JobStatus::Lost => {}
    }
}

/// Reports `Lost` if an asynchronous job unwinds before completing.
struct OutcomeGuard {
    job: RetryJob,
    stats: StatsHandle,
    completed: bool,
}

impl OutcomeGuard {
    fn new(job: RetryJob, stats: StatsHandle) -> Self {
        Self {
            job,
            stats,
            completed: false,
        }
    }

    fn complete(mut self, status: JobStatus) {
        self.completed = true;
        self.stats.record(&status);
        self.job.report(status);
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        // Dropped without completing and not unwinding: the task never ran
        // (rejection), which the submitter reports itself.
        if !self.completed && std::thread::panicking() {
            warn!(job_id = %self.job.id(), "retry job lost while unwinding");
            self.stats.record(&JobStatus::Lost);
            self.job.report(JobStatus::Lost);
        }
    }
}
