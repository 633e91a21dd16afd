//! NATS transport configuration

use serde::{Deserialize, Serialize};

/// JetStream storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Durable file storage
    File,
    /// Volatile memory storage
    Memory,
}

/// Configuration for the NATS transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatsConfig {
    /// Server URL (e.g., "nats://localhost:4222")
    pub url: String,

    /// JetStream stream holding all relay channels
    pub stream_name: String,

    /// Subject prefix; channel `c` maps to subject `{prefix}.c`
    pub subject_prefix: String,

    /// Storage backend for the stream
    pub storage: StorageType,

    /// Max messages retained in the stream (-1 = unlimited)
    pub max_messages: i64,

    /// Max bytes retained in the stream (-1 = unlimited)
    pub max_bytes: i64,

    /// Max message age in seconds (0 = unlimited)
    pub max_age_secs: u64,

    /// Publish deduplication window in seconds
    ///
    /// Two publishes carrying the same message id within this window
    /// collapse into one stored message.
    pub duplicate_window_secs: u64,

    /// How long an unacknowledged delivery waits before redelivery
    pub ack_wait_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Optional auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            stream_name: "RELAY_EVENTS".to_string(),
            subject_prefix: "relay".to_string(),
            storage: StorageType::File,
            max_messages: -1,
            max_bytes: -1,
            max_age_secs: 0,
            duplicate_window_secs: 120,
            ack_wait_secs: 30,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            token: None,
        }
    }
}

impl NatsConfig {
    /// Subject a channel maps to
    pub fn channel_subject(&self, channel: &str) -> String {
        format!("{}.{}", self.subject_prefix, channel)
    }

    /// Subjects the stream covers (every channel under the prefix)
    pub fn stream_subjects(&self) -> Vec<String> {
        vec![format!("{}.>", self.subject_prefix)]
    }

    /// Durable consumer name for a group on a channel
    ///
    /// JetStream consumer names must not contain `.`, `*`, `>` or
    /// spaces; channel names can (dead-letter channels end in ".DLQ").
    pub fn consumer_name(&self, group: &str, channel: &str) -> String {
        format!("{group}-{channel}").replace(['.', '*', '>', ' '], "-")
    }
}
