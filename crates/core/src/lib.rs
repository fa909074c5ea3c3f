//! `quickretry-core` — retry building blocks.
//!
//! This crate contains the **pure** pieces of the retry layer (no threads, no IO):
//! the validated policy, the error model and attempt history.

pub mod attempt;
pub mod error;
pub mod policy;

pub use attempt::AttemptRecord;
pub use error::{RetryError, RetryResult, WorkFailure};
pub use policy::{DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT, RetryPolicy};
