//! Retry job dispatch (publish side + subscriber registry).
//!
//! ```text
//! producer ── post(RetryJob) ──▶ EventBus ──▶ subscriber thread ──▶ RetryJobHandler
//!                                                                    ├─ sync:  RetryExecutor::run
//!                                                                    └─ async: WorkerPool
//! ```
//!
//! The dispatcher is an ordinary value: construct it once, share it (e.g. in an
//! `Arc`) between producers and the component that registers the consumer.
//! Posting never returns a work result. Producers that need one attach an
//! outcome sink to the job.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use quickretry_core::RetryResult;
use quickretry_events::{EventBus, InMemoryEventBus, RetryJob};

use crate::config::DispatcherConfig;
use crate::dispatch::processor::{RetryJobHandler, RetryProcessor, StatsHandle};
use crate::workers::{SubscriberWorker, WorkerHandle};

/// Identifies one registration on a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publish/subscribe channel for [`RetryJob`]s.
///
/// Every registered handler gets its own subscription and consumer thread.
/// Jobs posted in sequence from one thread are handled in that order by each
/// handler; with no handler registered a post is a silent no-op.
pub struct RetryDispatcher<B = Arc<InMemoryEventBus<RetryJob>>>
where
    B: EventBus<RetryJob>,
{
    bus: B,
    config: DispatcherConfig,
    subscribers: Mutex<HashMap<SubscriberId, WorkerHandle>>,
    next_id: AtomicU64,
}

impl RetryDispatcher {
    /// Dispatcher over a fresh in-memory bus.
    pub fn in_memory(config: DispatcherConfig) -> Self {
        Self::new(Arc::new(InMemoryEventBus::new()), config)
    }

    /// In-memory dispatcher with a [`RetryProcessor`] already registered.
    pub fn with_default_processor(
        config: DispatcherConfig,
    ) -> RetryResult<(Self, SubscriberId, StatsHandle)> {
        let dispatcher = Self::in_memory(config);
        let processor = RetryProcessor::from_config(&dispatcher.config)?;
        let stats = processor.stats_handle();
        let id = dispatcher.register(processor);
        Ok((dispatcher, id, stats))
    }
}

impl<B> RetryDispatcher<B>
where
    B: EventBus<RetryJob>,
{
    pub fn new(bus: B, config: DispatcherConfig) -> Self {
        Self {
            bus,
            config,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Hand `job` to every registered handler.
    ///
    /// Returns once the job is queued for each subscriber; handling happens on
    /// the subscriber threads. Only a broken bus is an error.
    pub fn post(&self, job: RetryJob) -> Result<(), B::Error> {
        let job_id = job.id();
        let is_async = job.is_async();
        self.bus.publish(job)?;

        let subscribers = self.bus.subscriber_count();
        if subscribers == 0 {
            debug!(dispatcher = %self.config.name, job_id = %job_id, "no subscriber; job dropped");
        } else {
            debug!(
                dispatcher = %self.config.name,
                job_id = %job_id,
                is_async,
                subscribers,
                "retry job posted"
            );
        }
        Ok(())
    }

    /// Start delivering posted jobs to `handler` on a dedicated thread.
    ///
    /// Only jobs posted after this call returns are delivered.
    pub fn register<H>(&self, handler: H) -> SubscriberId
    where
        H: RetryJobHandler,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = self.bus.subscribe();
        let worker = SubscriberWorker::spawn(
            format!("{}-subscriber-{id}", self.config.name),
            subscription,
            self.config.poll_interval,
            move |job: RetryJob| handler.on_retry_job(job),
        );

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, worker);
        info!(dispatcher = %self.config.name, subscriber = %id, "retry handler registered");
        id
    }

    /// Stop the handler registered as `id` and drop it.
    ///
    /// Blocks until its consumer thread exits; dropping the handler then
    /// drains and stops any pool it owns. Returns `false` for unknown ids.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let worker = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        match worker {
            Some(worker) => {
                worker.shutdown();
                info!(dispatcher = %self.config.name, subscriber = %id, "retry handler unregistered");
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Unregister every handler.
    pub fn shutdown(&self) {
        let workers: Vec<WorkerHandle> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, worker)| worker)
            .collect();

        for worker in workers {
            worker.shutdown();
        }
    }
}

impl<B> Drop for RetryDispatcher<B>
where
    B: EventBus<RetryJob>,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B> fmt::Debug for RetryDispatcher<B>
where
    B: EventBus<RetryJob>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryDispatcher")
            .field("config", &self.config)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}
