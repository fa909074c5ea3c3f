//! Event-based retry dispatch.
//!
//! Producers post [`RetryJob`](quickretry_events::RetryJob)s without knowing who
//! executes them; a registered [`RetryJobHandler`] (normally a
//! [`RetryProcessor`]) runs each one through the retry executor.

pub mod dispatcher;
pub mod processor;

pub use dispatcher::{RetryDispatcher, SubscriberId};
pub use processor::{ProcessorStats, RetryJobHandler, RetryProcessor, StatsHandle};
