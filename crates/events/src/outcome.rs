//! Terminal job outcomes, reported back through a job's outcome sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::job::JobId;

/// How a dispatched job ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// An attempt succeeded.
    Succeeded { value: JsonValue, attempts: u32 },
    /// Every allowed attempt failed.
    Exhausted { attempts: u32, last_error: String },
    /// The worker pool refused the job; the work unit never ran.
    Rejected { reason: String },
    /// The job was accepted but its result was lost (worker shut down or panicked).
    Lost,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded { .. })
    }

    /// Attempts made, when the work unit ran at all.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            JobStatus::Succeeded { attempts, .. } | JobStatus::Exhausted { attempts, .. } => {
                Some(*attempts)
            }
            JobStatus::Rejected { .. } | JobStatus::Lost => None,
        }
    }
}

/// Outcome message delivered to a job's sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    pub finished_at: DateTime<Utc>,
}
