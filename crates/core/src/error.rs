//! Retry error model.

use thiserror::Error;

/// Result type used across the retry layer.
pub type RetryResult<T> = Result<T, RetryError>;

/// Failure signaled by a work unit during a single attempt.
///
/// Work units report failure by returning `Err`; any error type convertible
/// into `anyhow::Error` works.
pub type WorkFailure = anyhow::Error;

/// Retry-level error.
///
/// Work failures never appear here directly: they are recovered inside the
/// retry loop and only surface through [`RetryError::Exhausted`].
#[derive(Debug, Error)]
pub enum RetryError {
    /// A policy value was out of range, or a required dependency was missing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every allowed attempt failed.
    #[error("retry attempts exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: WorkFailure,
    },

    /// The worker pool refused the submission (queue full or closed).
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The result of a submitted execution was lost before it was produced.
    #[error("worker disconnected before producing a result")]
    Disconnected,
}

impl RetryError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Number of attempts made before giving up, if this is an exhaustion error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
