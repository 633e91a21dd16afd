//! Relay configuration — opaque values consumed by the core
//!
//! Loading (files, env, flags) belongs to the embedding service; the
//! core takes plain structs with production defaults.

use crate::dlq::DeadLetterPolicy;
use crate::error::{RelayError, Result};
use crate::retry::RetryPolicy;

/// Category channel names
#[derive(Debug, Clone)]
pub struct ChannelNames {
    /// Channel carrying user events
    pub user_events: String,

    /// Channel carrying order events
    pub order_events: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            user_events: "user-events".to_string(),
            order_events: "order-events".to_string(),
        }
    }
}

/// Consumer group settings
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Consumer group id shared by all workers of this deployment
    pub group: String,

    /// Worker tasks per channel
    ///
    /// Workers beyond the partition count sit idle; fewer workers than
    /// partitions means some workers serve several partitions.
    pub concurrency: usize,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group: "event-relay".to_string(),
            concurrency: 3,
        }
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Category channel names
    pub channels: ChannelNames,

    /// Consumer group settings
    pub consumer: ConsumerSettings,

    /// Handler retry backoff
    pub retry: RetryPolicy,

    /// Dead-letter naming and failure policy
    pub dead_letter: DeadLetterPolicy,
}

impl RelayConfig {
    /// Check the configuration for values the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channels.user_events.is_empty() || self.channels.order_events.is_empty() {
            return Err(RelayError::Config("channel names must not be empty".to_string()));
        }
        if self.consumer.group.is_empty() {
            return Err(RelayError::Config("consumer group must not be empty".to_string()));
        }
        if self.consumer.concurrency == 0 {
            return Err(RelayError::Config("concurrency must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RelayError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.dead_letter.suffix.is_empty() {
            return Err(RelayError::Config(
                "dead-letter suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
