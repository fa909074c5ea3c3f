//! Integration tests for the full dispatch pipeline.
//!
//! Tests: RetryJob → RetryDispatcher → EventBus → RetryProcessor → RetryExecutor
//!
//! Verifies:
//! - Posting with nobody listening is a silent no-op
//! - Synchronous and asynchronous jobs report their outcome through the sink
//! - A single-worker pool runs asynchronous jobs one full retry loop at a time
//! - Unregistering drains jobs the pool already accepted
//! - A panicking synchronous job is reported lost and the consumer keeps going

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex, mpsc};
    use std::time::{Duration, Instant};

    use anyhow::bail;
    use serde_json::Value as JsonValue;

    use quickretry_core::RetryPolicy;
    use quickretry_events::{JobOutcome, JobStatus, RetryJob};

    use crate::config::DispatcherConfig;
    use crate::dispatch::{RetryDispatcher, RetryProcessor};

    const WAIT: Duration = Duration::from_secs(2);

    fn setup_logging() {
        quickretry_observability::init();
    }

    fn config(pool_size: usize) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_name("it")
            .with_pool_size(pool_size)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn policy(max_attempts: i64, delay_ms: u64) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(delay_ms)).unwrap()
    }

    #[test]
    fn post_without_subscriber_does_nothing() {
        setup_logging();
        let dispatcher = RetryDispatcher::in_memory(config(1));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let job = RetryJob::new(RetryPolicy::default(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(JsonValue::Null)
        });

        assert!(dispatcher.post(job).is_ok());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn synchronous_job_retries_on_the_subscriber_thread() {
        setup_logging();
        let (dispatcher, _id, stats) = RetryDispatcher::with_default_processor(config(1)).unwrap();
        let (tx, rx) = mpsc::channel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let job = RetryJob::new(policy(5, 10), move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= 3 {
                bail!("call {call} failed");
            }
            Ok(serde_json::json!(7))
        })
        .with_outcome_sink(tx);

        dispatcher.post(job).unwrap();

        let outcome = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            outcome.status,
            JobStatus::Succeeded {
                value: serde_json::json!(7),
                attempts: 4
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(stats.snapshot().jobs_succeeded, 1);
    }

    #[test]
    fn exhausted_job_reports_last_failure() {
        setup_logging();
        let (dispatcher, _id, stats) = RetryDispatcher::with_default_processor(config(1)).unwrap();
        let (tx, rx) = mpsc::channel();

        let job = RetryJob::new(policy(2, 0), || bail!("downstream unavailable"))
            .asynchronous(true)
            .with_outcome_sink(tx);
        dispatcher.post(job).unwrap();

        let outcome: JobOutcome = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            outcome.status,
            JobStatus::Exhausted {
                attempts: 3,
                last_error: "downstream unavailable".to_string()
            }
        );
        assert_eq!(stats.snapshot().jobs_exhausted, 1);
    }

    #[test]
    fn single_worker_runs_async_jobs_one_retry_loop_at_a_time() {
        setup_logging();
        let (dispatcher, _id, _stats) = RetryDispatcher::with_default_processor(config(1)).unwrap();
        let spans: Arc<Mutex<Vec<(usize, Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        for index in 0..2 {
            let spans = Arc::clone(&spans);
            let calls = Arc::new(AtomicU32::new(0));
            let first_call: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

            // Fails twice with a 15ms delay, so each loop spans at least 30ms.
            let job = RetryJob::new(policy(3, 15), move || {
                let now = Instant::now();
                let started = *first_call.lock().unwrap().get_or_insert(now);
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    bail!("not yet");
                }
                spans.lock().unwrap().push((index, started, Instant::now()));
                Ok(JsonValue::from(index))
            })
            .asynchronous(true)
            .with_outcome_sink(tx.clone());

            dispatcher.post(job).unwrap();
        }

        for _ in 0..2 {
            assert!(rx.recv_timeout(WAIT).unwrap().status.is_success());
        }

        let spans = spans.lock().unwrap();
        let (_, _, first_end) = spans.iter().find(|(i, _, _)| *i == 0).copied().unwrap();
        let (_, second_start, _) = spans.iter().find(|(i, _, _)| *i == 1).copied().unwrap();
        assert!(second_start >= first_end);
    }

    #[test]
    fn unregister_drains_accepted_async_jobs() {
        setup_logging();
        let dispatcher = RetryDispatcher::in_memory(config(1));
        let processor = RetryProcessor::from_config(dispatcher.config()).unwrap();
        let id = dispatcher.register(processor);

        let (started_tx, started_rx) = mpsc::channel();
        let started_tx = Mutex::new(started_tx);
        let (tx, rx) = mpsc::channel();

        let job = RetryJob::new(policy(1, 0), move || {
            let _ = started_tx.lock().unwrap().send(());
            std::thread::sleep(Duration::from_millis(30));
            Ok(JsonValue::Bool(true))
        })
        .asynchronous(true)
        .with_outcome_sink(tx);
        dispatcher.post(job).unwrap();

        started_rx.recv_timeout(WAIT).unwrap();
        assert!(dispatcher.unregister(id));

        // The pool was joined during unregister, so the outcome is already there.
        assert!(rx.try_recv().unwrap().status.is_success());
    }

    #[test]
    fn panicking_sync_job_does_not_stop_the_consumer() {
        setup_logging();
        let (dispatcher, _id, stats) = RetryDispatcher::with_default_processor(config(1)).unwrap();
        let (tx, rx) = mpsc::channel();

        let panicking = RetryJob::new(policy(1, 0), || panic!("work unit panicked"))
            .with_outcome_sink(tx.clone());
        let following =
            RetryJob::new(policy(1, 0), || Ok(serde_json::json!("after"))).with_outcome_sink(tx);

        dispatcher.post(panicking).unwrap();
        dispatcher.post(following).unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap().status, JobStatus::Lost);
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap().status,
            JobStatus::Succeeded {
                value: serde_json::json!("after"),
                attempts: 1
            }
        );
        assert_eq!(dispatcher.subscriber_count(), 1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.jobs_received, 2);
        assert_eq!(snapshot.jobs_lost, 1);
        assert_eq!(snapshot.jobs_succeeded, 1);
    }

    #[test]
    fn handler_failures_never_reach_the_poster() {
        setup_logging();
        let (dispatcher, _id, stats) = RetryDispatcher::with_default_processor(config(1)).unwrap();
        let (tx, rx) = mpsc::channel();

        let failing = RetryJob::new(policy(1, 0), || bail!("always")).with_outcome_sink(tx.clone());
        let succeeding =
            RetryJob::new(policy(1, 0), || Ok(JsonValue::Null)).with_outcome_sink(tx);

        assert!(dispatcher.post(failing).is_ok());
        assert!(dispatcher.post(succeeding).is_ok());

        assert!(!rx.recv_timeout(WAIT).unwrap().status.is_success());
        assert!(rx.recv_timeout(WAIT).unwrap().status.is_success());
        assert_eq!(stats.snapshot().jobs_received, 2);
    }
}
