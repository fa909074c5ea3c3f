//! `quickretry-events` — retry jobs and the bus that carries them.
//!
//! Producers describe retryable work as a [`RetryJob`] and publish it; consumers
//! subscribe and execute. Neither side knows about the other.

pub mod bus;
pub mod in_memory_bus;
pub mod job;
pub mod outcome;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use job::{JobId, JobWork, RetryJob};
pub use outcome::{JobOutcome, JobStatus};
