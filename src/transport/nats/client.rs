//! NATS JetStream client — connect, send, subscribe

use super::config::{NatsConfig, StorageType};
use super::subscriber::NatsSubscription;
use crate::error::{RelayError, Result};
use crate::transport::{MessageHeaders, SendReceipt};
use async_nats::jetstream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Header carrying the ordering key; JetStream messages have no native
/// key field
pub(super) const KEY_HEADER: &str = "Relay-Key";

/// NATS JetStream client
///
/// Low-level client for the relay's channel operations. Manages the
/// connection and the JetStream stream lifecycle.
pub struct NatsClient {
    /// NATS client connection
    client: async_nats::Client,

    /// JetStream context
    jetstream: jetstream::Context,

    /// JetStream stream handle (Mutex for methods requiring &mut self)
    stream: Mutex<jetstream::stream::Stream>,

    /// Configuration
    config: Arc<NatsConfig>,
}

impl NatsClient {
    /// Connect to NATS and initialize the JetStream stream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let connect_opts = build_connect_options(&config);

        let client = connect_opts
            .connect(&config.url)
            .await
            .map_err(|e| RelayError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        let jetstream = jetstream::new(client.clone());
        let stream = ensure_stream(&jetstream, &config).await?;

        Ok(Self {
            client,
            jetstream,
            stream: Mutex::new(stream),
            config: Arc::new(config),
        })
    }

    /// Send a keyed message, returning the stream sequence as the offset
    ///
    /// `channel:key` is set as `Nats-Msg-Id`, so resends of the same
    /// key to the same channel within the dedup window collapse into
    /// one stored message. The channel scoping matters: the stream
    /// also holds dead-letter channels, and a dead-letter forward
    /// keeps the original key.
    pub async fn send(
        &self,
        channel: &str,
        key: &str,
        payload: Bytes,
        headers: &MessageHeaders,
    ) -> Result<SendReceipt> {
        let subject = self.config.channel_subject(channel);
        let msg_id = format!("{channel}:{key}");

        let mut nats_headers = async_nats::HeaderMap::new();
        for (name, value) in headers {
            nats_headers.insert(name.as_str(), value.as_str());
        }
        nats_headers.insert("Nats-Msg-Id", msg_id.as_str());
        nats_headers.insert(KEY_HEADER, key);

        let ack_fut = self
            .jetstream
            .publish_with_headers(subject.clone(), nats_headers, payload)
            .await
            .map_err(|e| RelayError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        let ack = tokio::time::timeout(
            Duration::from_secs(self.config.request_timeout_secs),
            ack_fut,
        )
        .await
        .map_err(|_| {
            RelayError::Timeout(format!(
                "Publish ack timed out after {}s for channel '{}'",
                self.config.request_timeout_secs, channel
            ))
        })?
        .map_err(|e| RelayError::Publish {
            channel: channel.to_string(),
            reason: format!("ack failed: {}", e),
        })?;

        tracing::debug!(
            key = %key,
            channel = %channel,
            subject = %subject,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "Message sent"
        );

        // JetStream does not partition; the stream is totally ordered
        Ok(SendReceipt {
            partition: 0,
            offset: ack.sequence,
        })
    }

    /// Create or join a durable group consumer on a channel
    pub async fn subscribe_group(&self, channel: &str, group: &str) -> Result<NatsSubscription> {
        let subject = self.config.channel_subject(channel);
        let consumer_name = self.config.consumer_name(group, channel);

        let consumer = self
            .stream
            .lock()
            .await
            .get_or_create_consumer(
                &consumer_name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(consumer_name.clone()),
                    filter_subject: subject.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: Duration::from_secs(self.config.ack_wait_secs),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                RelayError::Consumer(format!(
                    "Failed to create durable consumer '{}': {}",
                    consumer_name, e
                ))
            })?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| RelayError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            consumer = %consumer_name,
            subject = %subject,
            "Durable subscription created"
        );

        Ok(NatsSubscription::new(messages, channel.to_string()))
    }

    /// Get stream info
    pub async fn stream_info(&self) -> Result<StreamInfo> {
        let mut stream = self.stream.lock().await;
        let info = stream
            .info()
            .await
            .map_err(|e| RelayError::Channel(format!("Failed to get stream info: {}", e)))?;

        Ok(StreamInfo {
            messages: info.state.messages,
            bytes: info.state.bytes,
            consumer_count: info.state.consumer_count,
        })
    }

    /// Get the underlying NATS client
    pub fn nats_client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}

/// Summary of stream state
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub messages: u64,
    pub bytes: u64,
    pub consumer_count: usize,
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}

/// Ensure the JetStream stream exists with the correct configuration
async fn ensure_stream(
    js: &jetstream::Context,
    config: &NatsConfig,
) -> Result<jetstream::stream::Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let max_age = if config.max_age_secs > 0 {
        Duration::from_secs(config.max_age_secs)
    } else {
        Duration::ZERO
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.stream_subjects(),
        storage,
        max_messages: config.max_messages,
        max_bytes: config.max_bytes,
        max_age,
        duplicate_window: Duration::from_secs(config.duplicate_window_secs),
        retention: jetstream::stream::RetentionPolicy::Limits,
        ..Default::default()
    };

    let stream = js
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| {
            RelayError::Channel(format!(
                "Failed to create/get stream '{}': {}",
                config.stream_name, e
            ))
        })?;

    tracing::info!(
        stream = %config.stream_name,
        subjects = ?config.stream_subjects(),
        "JetStream stream ready"
    );

    Ok(stream)
}
