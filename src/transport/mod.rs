//! Channel transport trait — the seam between the relay core and brokers
//!
//! All transports (NATS JetStream, in-memory, etc.) implement
//! [`ChannelTransport`] to provide the three operations the core uses:
//! keyed send, group subscribe, and per-message commit. Everything else a
//! broker can do (replication, partition management, retention) stays on
//! the broker side of this seam.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::HashMap;

pub mod memory;
pub mod nats;

/// Message headers carried out-of-band from the payload
pub type MessageHeaders = HashMap<String, String>;

/// Broker confirmation for a sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReceipt {
    /// Partition the message landed on (0 for unpartitioned transports)
    pub partition: u32,

    /// Offset/sequence assigned by the transport
    pub offset: u64,
}

/// Core trait for channel transports
///
/// Implementations handle broker-specific delivery; the relay core only
/// assumes at-least-once delivery, per-partition ordering by key, and
/// explicit per-message acknowledgement.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Send a keyed message with headers, awaiting broker confirmation
    ///
    /// Messages with the same key preserve publish order for consumers.
    /// The key doubles as the transport's deduplication id where the
    /// transport supports one.
    async fn send_with_headers(
        &self,
        channel: &str,
        key: &str,
        payload: Bytes,
        headers: &MessageHeaders,
    ) -> Result<SendReceipt>;

    /// Send a keyed message without headers
    async fn send(&self, channel: &str, key: &str, payload: Bytes) -> Result<SendReceipt> {
        self.send_with_headers(channel, key, payload, &MessageHeaders::new())
            .await
    }

    /// Join a consumer group on a channel
    ///
    /// Subscriptions in the same group compete for messages; each message
    /// is delivered to one member at a time. An unacknowledged message is
    /// eventually redelivered.
    async fn subscribe(&self, channel: &str, group: &str) -> Result<Box<dyn ChannelSubscription>>;

    /// Health check — true when the transport is connected and operational
    async fn health(&self) -> Result<bool>;

    /// Transport name (e.g., "nats", "memory")
    fn name(&self) -> &str;
}

/// Async handle for consuming messages from one channel as one group member
#[async_trait]
pub trait ChannelSubscription: Send {
    /// Receive the next message with manual commit control
    ///
    /// Returns `None` when the subscription has been closed by the
    /// transport.
    async fn next(&mut self) -> Result<Option<PendingMessage>>;
}

/// A message as delivered by a transport, before decoding
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel the message was consumed from
    pub channel: String,

    /// Partition it was read from (0 for unpartitioned transports)
    pub partition: u32,

    /// Transport-assigned offset/sequence
    pub offset: u64,

    /// Ordering key it was sent with
    pub key: String,

    /// Raw payload bytes
    pub payload: Bytes,

    /// Out-of-band headers
    pub headers: MessageHeaders,

    /// Transport-level delivery attempt (1 = first delivery)
    pub delivery_count: u64,
}

/// A delivered message pending acknowledgement
///
/// Dropping this without calling [`commit`](Self::commit) leaves the
/// message uncommitted; the transport redelivers it later (after its
/// ack-wait, or immediately to the next subscriber for the in-memory
/// transport).
pub struct PendingMessage {
    /// The delivered message
    pub message: IncomingMessage,

    /// Commit callback — call to acknowledge processing
    commit_fn: Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>,
}

impl PendingMessage {
    /// Create a pending message with its commit callback
    pub fn new(
        message: IncomingMessage,
        commit_fn: impl FnOnce() -> BoxFuture<'static, Result<()>> + Send + 'static,
    ) -> Self {
        Self {
            message,
            commit_fn: Box::new(commit_fn),
        }
    }

    /// Acknowledge the message on its source channel
    pub async fn commit(self) -> Result<()> {
        (self.commit_fn)().await
    }
}

impl std::fmt::Debug for PendingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingMessage")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}
