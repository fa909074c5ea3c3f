//! Retry policy: how many retries to allow and how long to wait between attempts.
//!
//! A policy is validated when it is mutated, never when it is used. Once a
//! `RetryPolicy` value exists it is valid; a rejected setter leaves the policy
//! untouched and reports the problem immediately.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RetryError, RetryResult};

/// Default number of retries after the first failure.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Largest accepted `max_attempts`; the invocation count must still fit in a `u32`.
pub const MAX_ATTEMPTS_LIMIT: u32 = u32::MAX - 1;

/// Fixed-delay retry policy.
///
/// `max_attempts` counts retries, not invocations: a work unit runs at most
/// `max_attempts + 1` times. The delay has millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyRepr", into = "PolicyRepr")]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Build a policy, validating both fields.
    pub fn new(max_attempts: i64, delay: Duration) -> RetryResult<Self> {
        let mut policy = Self::default();
        policy.set_max_attempts(max_attempts)?.set_delay(delay);
        Ok(policy)
    }

    /// Set the number of retries after the first failure.
    ///
    /// Must be in `1..=MAX_ATTEMPTS_LIMIT`.
    pub fn set_max_attempts(&mut self, max_attempts: i64) -> RetryResult<&mut Self> {
        if max_attempts <= 0 {
            return Err(RetryError::invalid_argument(format!(
                "max_attempts must be at least 1, got {max_attempts}"
            )));
        }
        self.max_attempts = u32::try_from(max_attempts)
            .ok()
            .filter(|n| *n <= MAX_ATTEMPTS_LIMIT)
            .ok_or_else(|| {
                RetryError::invalid_argument(format!(
                    "max_attempts must be at most {MAX_ATTEMPTS_LIMIT}, got {max_attempts}"
                ))
            })?;
        Ok(self)
    }

    /// Set the inter-attempt delay from a signed millisecond count.
    pub fn set_delay_millis(&mut self, delay_ms: i64) -> RetryResult<&mut Self> {
        if delay_ms < 0 {
            return Err(RetryError::invalid_argument(format!(
                "delay must not be negative, got {delay_ms}ms"
            )));
        }
        self.delay = Duration::from_millis(delay_ms.unsigned_abs());
        Ok(self)
    }

    /// Set the inter-attempt delay, truncated to whole milliseconds.
    pub fn set_delay(&mut self, delay: Duration) -> &mut Self {
        self.delay = whole_millis(delay);
        self
    }

    /// Consuming form of [`set_max_attempts`](Self::set_max_attempts).
    pub fn with_max_attempts(mut self, max_attempts: i64) -> RetryResult<Self> {
        self.set_max_attempts(max_attempts)?;
        Ok(self)
    }

    /// Consuming form of [`set_delay`](Self::set_delay).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Upper bound on invocations of the work unit (first try plus retries).
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts + 1
    }
}

/// Drop sub-millisecond precision so the policy matches its `delay_ms` wire form.
fn whole_millis(delay: Duration) -> Duration {
    let millis = delay.as_millis().min(i64::MAX as u128);
    Duration::from_millis(millis as u64)
}

/// Wire form: `{ "max_attempts": 3, "delay_ms": 10 }`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PolicyRepr {
    max_attempts: i64,
    #[serde(default)]
    delay_ms: i64,
}

impl TryFrom<PolicyRepr> for RetryPolicy {
    type Error = RetryError;

    fn try_from(repr: PolicyRepr) -> Result<Self, Self::Error> {
        let mut policy = RetryPolicy::default();
        policy
            .set_max_attempts(repr.max_attempts)?
            .set_delay_millis(repr.delay_ms)?;
        Ok(policy)
    }
}

impl From<RetryPolicy> for PolicyRepr {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: i64::from(policy.max_attempts),
            delay_ms: policy.delay.as_millis() as i64,
        }
    }
}
