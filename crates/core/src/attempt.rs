//! Per-attempt failure history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A failed attempt, as recorded by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-indexed attempt number (1 is the first try).
    pub attempt: u32,
    /// Rendered failure message, including its cause chain.
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(attempt: u32, error: &anyhow::Error) -> Self {
        Self {
            attempt,
            error: format!("{error:#}"),
            failed_at: Utc::now(),
        }
    }

    /// Whether this attempt was a retry rather than the first try.
    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}
