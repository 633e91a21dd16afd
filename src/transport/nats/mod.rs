//! NATS JetStream channel transport
//!
//! Implements [`ChannelTransport`] over JetStream: one totally-ordered
//! stream covers every relay channel (dead-letter channels included),
//! durable consumers provide group semantics, and explicit acks give
//! at-least-once delivery with redelivery after `ack_wait`.

mod client;
mod config;
mod subscriber;

pub use client::{NatsClient, StreamInfo};
pub use config::{NatsConfig, StorageType};
pub use subscriber::NatsSubscription;

use crate::error::Result;
use crate::transport::{ChannelSubscription, ChannelTransport, MessageHeaders, SendReceipt};
use async_trait::async_trait;
use bytes::Bytes;

/// NATS JetStream implementation of [`ChannelTransport`]
pub struct NatsTransport {
    client: NatsClient,
}

impl NatsTransport {
    /// Connect to NATS and initialize the JetStream stream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = NatsClient::connect(config).await?;
        Ok(Self { client })
    }

    /// Get the underlying NATS client for advanced usage
    pub fn client(&self) -> &NatsClient {
        &self.client
    }
}

#[async_trait]
impl ChannelTransport for NatsTransport {
    async fn send_with_headers(
        &self,
        channel: &str,
        key: &str,
        payload: Bytes,
        headers: &MessageHeaders,
    ) -> Result<SendReceipt> {
        self.client.send(channel, key, payload, headers).await
    }

    async fn subscribe(&self, channel: &str, group: &str) -> Result<Box<dyn ChannelSubscription>> {
        let subscription = self.client.subscribe_group(channel, group).await?;
        Ok(Box::new(subscription))
    }

    async fn health(&self) -> Result<bool> {
        self.client.stream_info().await.map(|_| true)
    }

    fn name(&self) -> &str {
        "nats"
    }
}
