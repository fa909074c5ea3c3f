//! Tracing/logging setup shared by retry services and tests.

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (format, filters).
pub mod tracing;

pub use self::tracing::{LogFormat, ObservabilityConfig, ObservabilityError};
