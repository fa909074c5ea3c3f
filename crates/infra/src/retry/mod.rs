//! Retry execution: the retry loop, its worker pool and result handles.
//!
//! ## Components
//!
//! - `RetryExecutor`: runs a work unit under a `RetryPolicy`, inline or on a pool
//! - `WorkerPool`: bounded pool that runs submitted retry loops
//! - `JobHandle`: await/poll the result of a submitted loop

pub mod executor;
pub mod handle;
pub mod pool;

pub use executor::{RetryExecutor, RetryReport};
pub use handle::JobHandle;
pub use pool::WorkerPool;
