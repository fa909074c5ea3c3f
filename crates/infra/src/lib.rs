//! Retry execution and dispatch infrastructure: worker pools, the retry loop,
//! the job dispatcher and its consumers.

pub mod adapter;
pub mod config;
pub mod dispatch;
pub mod retry;
pub mod workers;

mod integration_tests;

pub use adapter::{Invocation, RetryAttributes, call_with_retry};
pub use config::{ConfigError, DispatcherConfig};
pub use dispatch::{
    ProcessorStats, RetryDispatcher, RetryJobHandler, RetryProcessor, StatsHandle, SubscriberId,
};
pub use retry::{JobHandle, RetryExecutor, RetryReport, WorkerPool};
