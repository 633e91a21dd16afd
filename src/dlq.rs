//! Dead-letter publishing — route exhausted events to a parking channel
//!
//! The dead-letter channel name is derived from the source channel, never
//! configured per channel, so operators can always predict where failed
//! events land. The original payload is forwarded byte-for-byte with the
//! same ordering key; failure context travels out-of-band in headers,
//! which keeps every dead-lettered message replayable as-is.

use crate::error::{RelayError, Result};
use crate::transport::{ChannelTransport, IncomingMessage, SendReceipt};
use chrono::Utc;
use std::sync::Arc;

/// Default suffix appended to a source channel name
pub const DEFAULT_DEAD_LETTER_SUFFIX: &str = ".DLQ";

/// Header: channel the message originally arrived on
pub const HEADER_SOURCE_CHANNEL: &str = "Relay-Source-Channel";

/// Header: partition the message originally arrived on
pub const HEADER_SOURCE_PARTITION: &str = "Relay-Source-Partition";

/// Header: message of the last handler error (or decode error)
pub const HEADER_ERROR: &str = "Relay-Error";

/// Header: handler attempts consumed before dead-lettering
pub const HEADER_ATTEMPTS: &str = "Relay-Attempts";

/// Header: RFC 3339 timestamp of the dead-letter publish
pub const HEADER_FAILED_AT: &str = "Relay-Failed-At";

/// Derive the dead-letter channel for a source channel
pub fn dead_letter_channel(channel: &str, suffix: &str) -> String {
    format!("{channel}{suffix}")
}

/// Dead-letter behavior knobs
#[derive(Debug, Clone)]
pub struct DeadLetterPolicy {
    /// Suffix appended to the source channel name
    pub suffix: String,

    /// Acknowledge the source message even when the dead-letter publish
    /// fails
    ///
    /// `true` keeps the partition moving at the cost of possible event
    /// loss (logged at error severity). `false` leaves the source
    /// offset uncommitted so the transport redelivers the message, at
    /// the cost of blocking the partition while the dead-letter channel
    /// is unreachable.
    pub ack_on_failure: bool,
}

impl Default for DeadLetterPolicy {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_DEAD_LETTER_SUFFIX.to_string(),
            ack_on_failure: true,
        }
    }
}

/// Publishes exhausted messages to their derived dead-letter channel
pub struct DeadLetterPublisher {
    transport: Arc<dyn ChannelTransport>,
    policy: DeadLetterPolicy,
}

impl DeadLetterPublisher {
    /// Create a publisher over the given transport
    pub fn new(transport: Arc<dyn ChannelTransport>, policy: DeadLetterPolicy) -> Self {
        Self { transport, policy }
    }

    /// Whether the source message is acknowledged despite a failed
    /// dead-letter publish
    pub fn ack_on_failure(&self) -> bool {
        self.policy.ack_on_failure
    }

    /// Dead-letter channel for a source channel under this policy
    pub fn channel_for(&self, channel: &str) -> String {
        dead_letter_channel(channel, &self.policy.suffix)
    }

    /// Forward a message to its dead-letter channel
    ///
    /// The payload and original headers are preserved unchanged; failure
    /// context is appended as `Relay-*` headers.
    pub async fn publish(
        &self,
        source: &IncomingMessage,
        error: &str,
        attempts: u32,
    ) -> Result<SendReceipt> {
        let target = self.channel_for(&source.channel);

        let mut headers = source.headers.clone();
        headers.insert(HEADER_SOURCE_CHANNEL.to_string(), source.channel.clone());
        headers.insert(
            HEADER_SOURCE_PARTITION.to_string(),
            source.partition.to_string(),
        );
        headers.insert(HEADER_ERROR.to_string(), error.to_string());
        headers.insert(HEADER_ATTEMPTS.to_string(), attempts.to_string());
        headers.insert(HEADER_FAILED_AT.to_string(), Utc::now().to_rfc3339());

        match self
            .transport
            .send_with_headers(&target, &source.key, source.payload.clone(), &headers)
            .await
        {
            Ok(receipt) => {
                tracing::warn!(
                    key = %source.key,
                    channel = %source.channel,
                    dead_letter_channel = %target,
                    attempts,
                    error = %error,
                    "Event dead-lettered"
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!(
                    key = %source.key,
                    channel = %source.channel,
                    dead_letter_channel = %target,
                    reason = %e,
                    "Dead-letter publish failed, event may be lost"
                );
                Err(RelayError::DeadLetter {
                    channel: target,
                    reason: e.to_string(),
                })
            }
        }
    }
}
