//! Call-site adapter: wrap a plain call with retry attributes declared next to it.
//!
//! ```ignore
//! const FETCH_RETRY: RetryAttributes = RetryAttributes::new(5, 10, false);
//!
//! let rate = call_with_retry(&FETCH_RETRY, None, || client.fetch_rate())?.wait()?;
//! ```

use serde::{Deserialize, Serialize};

use quickretry_core::{RetryPolicy, RetryResult};

use crate::retry::{JobHandle, RetryExecutor, WorkerPool};

/// Declared retry behaviour for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryAttributes {
    /// Retries after the first failure; 0 keeps the policy default.
    pub count: i64,
    /// Delay between attempts, in milliseconds.
    pub sleep_ms: i64,
    /// Run on a worker pool instead of the calling thread.
    pub asynchronous: bool,
}

impl RetryAttributes {
    pub const fn new(count: i64, sleep_ms: i64, asynchronous: bool) -> Self {
        Self {
            count,
            sleep_ms,
            asynchronous,
        }
    }

    /// Build the validated policy these attributes describe.
    pub fn policy(&self) -> RetryResult<RetryPolicy> {
        let mut policy = RetryPolicy::default();
        if self.count != 0 {
            policy.set_max_attempts(self.count)?;
        }
        policy.set_delay_millis(self.sleep_ms)?;
        Ok(policy)
    }
}

/// Result of [`call_with_retry`].
#[derive(Debug)]
pub enum Invocation<T> {
    /// The call ran on the calling thread and succeeded.
    Completed(T),
    /// The call was handed to a worker pool.
    Submitted(JobHandle<T>),
}

impl<T> Invocation<T> {
    /// The value, waiting for the pool if the call was submitted.
    pub fn wait(self) -> RetryResult<T> {
        match self {
            Invocation::Completed(value) => Ok(value),
            Invocation::Submitted(handle) => handle.wait(),
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Invocation::Submitted(_))
    }
}

/// Run `work` as `attrs` declares: inline, or on `pool` when asynchronous.
///
/// Invalid attributes, or an asynchronous call without a pool, fail before
/// `work` is invoked.
pub fn call_with_retry<T, F>(
    attrs: &RetryAttributes,
    pool: Option<&WorkerPool>,
    work: F,
) -> RetryResult<Invocation<T>>
where
    F: FnMut() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let policy = attrs.policy()?;

    if attrs.asynchronous {
        RetryExecutor::submit(work, &policy, pool).map(Invocation::Submitted)
    } else {
        RetryExecutor::execute(work, &policy).map(Invocation::Completed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_count_keeps_default_policy() {
        let policy = RetryAttributes::default().policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn declared_values_become_the_policy() {
        let policy = RetryAttributes::new(5, 10, false).policy().unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_millis(10));
    }

    #[test]
    fn invalid_attributes_fail_before_running_work() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = call_with_retry(&RetryAttributes::new(-2, 0, false), None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(result.unwrap_err().is_invalid_argument());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn synchronous_call_completes_inline() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let invocation = call_with_retry(&RetryAttributes::new(3, 0, false), None, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("first call fails");
            }
            Ok("ok")
        })
        .unwrap();

        assert!(!invocation.is_submitted());
        assert_eq!(invocation.wait().unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn asynchronous_call_needs_a_pool() {
        let attrs = RetryAttributes::new(1, 0, true);
        let err = call_with_retry(&attrs, None, || Ok(1)).unwrap_err();
        assert!(err.is_invalid_argument());

        let pool = WorkerPool::new("adapter", 1, 4).unwrap();
        let invocation = call_with_retry(&attrs, Some(&pool), || Ok(1)).unwrap();
        assert!(invocation.is_submitted());
        assert_eq!(invocation.wait().unwrap(), 1);
    }

    #[test]
    fn attributes_deserialize_with_defaults() {
        let attrs: RetryAttributes =
            serde_json::from_value(serde_json::json!({"count": 5, "asynchronous": true})).unwrap();
        assert_eq!(attrs, RetryAttributes::new(5, 0, true));
    }
}
