use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of a fan-out batch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FanOutConfig {
    /// Number of results that can be parked in the channel without a waiting consumer.
    ///
    /// `0` turns the channel into a rendezvous point where every send waits for the consumer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Maximum number of producers executing their work at the same time, `0` for no limit.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Time, in milliseconds, in-flight producers get to finish once shutdown is requested.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl FanOutConfig {
    /// Default channel capacity, a rendezvous channel.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 0;

    /// Default concurrency limit, unbounded.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 0;

    /// Default shutdown grace period in milliseconds.
    pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

    /// Largest accepted channel capacity.
    pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

    /// Returns the shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validates fan-out configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_capacity > Self::MAX_CHANNEL_CAPACITY {
            return Err(ValidationError::InvalidFieldValue {
                field: "fanout.channel_capacity".to_string(),
                constraint: format!("must be at most {}", Self::MAX_CHANNEL_CAPACITY),
            });
        }

        Ok(())
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_concurrency: default_max_concurrency(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_channel_capacity() -> usize {
    FanOutConfig::DEFAULT_CHANNEL_CAPACITY
}

fn default_max_concurrency() -> usize {
    FanOutConfig::DEFAULT_MAX_CONCURRENCY
}

fn default_shutdown_grace_ms() -> u64 {
    FanOutConfig::DEFAULT_SHUTDOWN_GRACE_MS
}
