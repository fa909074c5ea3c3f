//! Dispatcher configuration and environment loading.

use std::time::Duration;

use thiserror::Error;

pub const ENV_POOL_SIZE: &str = "QUICKRETRY_POOL_SIZE";
pub const ENV_QUEUE_CAPACITY: &str = "QUICKRETRY_QUEUE_CAPACITY";
pub const ENV_POLL_INTERVAL_MS: &str = "QUICKRETRY_POLL_INTERVAL_MS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Retry dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Name for logging and thread names
    pub name: String,
    /// Worker threads per registered processor
    pub pool_size: usize,
    /// Pending asynchronous jobs a processor accepts before rejecting
    pub queue_capacity: usize,
    /// How often idle subscriber threads check for shutdown
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "retry-dispatcher".to_string(),
            pool_size: 3,
            queue_capacity: 256,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl DispatcherConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Defaults overridden by `QUICKRETRY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            config.pool_size = parse_positive(ENV_POOL_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = parse_positive(ENV_QUEUE_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms = parse_positive(ENV_POLL_INTERVAL_MS, &raw)?;
            config.poll_interval = Duration::from_millis(ms as u64);
        }

        Ok(config)
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    match raw.trim().parse::<usize>() {
        Ok(0) => Err(invalid("must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("not a non-negative integer")),
    }
}
