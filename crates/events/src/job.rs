//! Retry job: a retryable unit of work plus its policy, as a postable value.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use quickretry_core::RetryPolicy;

use crate::outcome::{JobOutcome, JobStatus};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Time-ordered (UUIDv7) identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work unit carried by a job.
///
/// Returns a dynamic value on success; `Err` triggers a retry. Shared so the
/// job can be cloned for fan-out without cloning the closure itself.
pub type JobWork = Arc<dyn Fn() -> anyhow::Result<JsonValue> + Send + Sync>;

/// A retryable operation described as data.
///
/// Built completely before it is posted and read-only afterwards: fields are
/// private and the builder methods consume the job.
#[derive(Clone)]
pub struct RetryJob {
    id: JobId,
    posted_at: DateTime<Utc>,
    policy: RetryPolicy,
    work: JobWork,
    is_async: bool,
    outcome_sink: Option<Sender<JobOutcome>>,
}

impl RetryJob {
    /// Create a synchronous job with the given policy.
    pub fn new<F>(policy: RetryPolicy, work: F) -> Self
    where
        F: Fn() -> anyhow::Result<JsonValue> + Send + Sync + 'static,
    {
        Self {
            id: JobId::new(),
            posted_at: Utc::now(),
            policy,
            work: Arc::new(work),
            is_async: false,
            outcome_sink: None,
        }
    }

    /// Run the job on the consumer's worker pool instead of the consumer thread.
    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Report the terminal state of this job on `sink`.
    pub fn with_outcome_sink(mut self, sink: Sender<JobOutcome>) -> Self {
        self.outcome_sink = Some(sink);
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn posted_at(&self) -> DateTime<Utc> {
        self.posted_at
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn work(&self) -> JobWork {
        Arc::clone(&self.work)
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn has_outcome_sink(&self) -> bool {
        self.outcome_sink.is_some()
    }

    /// Send the terminal status to the outcome sink, if one is attached.
    ///
    /// A sink whose receiver is gone is ignored; the poster stopped listening.
    pub fn report(&self, status: JobStatus) {
        if let Some(sink) = &self.outcome_sink {
            let _ = sink.send(JobOutcome {
                job_id: self.id,
                status,
                finished_at: Utc::now(),
            });
        }
    }
}

impl fmt::Debug for RetryJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryJob")
            .field("id", &self.id)
            .field("posted_at", &self.posted_at)
            .field("policy", &self.policy)
            .field("is_async", &self.is_async)
            .field("has_outcome_sink", &self.outcome_sink.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn new_job_is_synchronous_without_sink() {
        let job = RetryJob::new(RetryPolicy::default(), || Ok(JsonValue::Null));

        assert!(!job.is_async());
        assert!(!job.has_outcome_sink());
        assert_eq!(job.policy(), RetryPolicy::default());
    }

    #[test]
    fn clones_share_identity_and_work() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1)).unwrap();
        let job = RetryJob::new(policy, || Ok(serde_json::json!(42))).asynchronous(true);
        let copy = job.clone();

        assert_eq!(copy.id(), job.id());
        assert!(copy.is_async());
        assert_eq!((copy.work())().unwrap(), serde_json::json!(42));
    }

    #[test]
    fn report_sends_outcome_to_sink() {
        let (tx, rx) = mpsc::channel();
        let job = RetryJob::new(RetryPolicy::default(), || Ok(JsonValue::Null))
            .with_outcome_sink(tx);

        job.report(JobStatus::Succeeded {
            value: serde_json::json!("done"),
            attempts: 1,
        });

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.job_id, job.id());
        assert!(outcome.status.is_success());
    }

    #[test]
    fn report_without_sink_is_silent() {
        let job = RetryJob::new(RetryPolicy::default(), || Ok(JsonValue::Null));
        job.report(JobStatus::Rejected {
            reason: "queue full".into(),
        });
    }

    #[test]
    fn debug_omits_work_closure() {
        let job = RetryJob::new(RetryPolicy::default(), || Ok(JsonValue::Null));
        let rendered = format!("{job:?}");
        assert!(rendered.contains("RetryJob"));
        assert!(rendered.contains("is_async: false"));
    }
}
