//! JetStream message stream adapted to the relay subscription trait

use super::client::KEY_HEADER;
use crate::error::{RelayError, Result};
use crate::transport::{ChannelSubscription, IncomingMessage, MessageHeaders, PendingMessage};
use async_nats::jetstream;
use async_trait::async_trait;
use futures::StreamExt;

/// One durable group member consuming a channel subject
pub struct NatsSubscription {
    messages: jetstream::consumer::pull::Stream,
    channel: String,
}

impl NatsSubscription {
    pub(super) fn new(messages: jetstream::consumer::pull::Stream, channel: String) -> Self {
        Self { messages, channel }
    }
}

#[async_trait]
impl ChannelSubscription for NatsSubscription {
    async fn next(&mut self) -> Result<Option<PendingMessage>> {
        let message = match self.messages.next().await {
            None => return Ok(None),
            Some(Err(e)) => {
                return Err(RelayError::Consumer(format!("message stream error: {}", e)))
            }
            Some(Ok(message)) => message,
        };

        let (offset, delivery_count) = {
            let info = message
                .info()
                .map_err(|e| RelayError::Consumer(format!("missing delivery info: {}", e)))?;
            (info.stream_sequence, info.delivered.max(1) as u64)
        };

        let mut headers = MessageHeaders::new();
        if let Some(header_map) = message.headers.as_ref() {
            for (name, values) in header_map.iter() {
                let name = name.to_string();
                // transport-internal headers stay on the transport side
                if name == "Nats-Msg-Id" || name == KEY_HEADER {
                    continue;
                }
                if let Some(value) = values.first() {
                    headers.insert(name, value.to_string());
                }
            }
        }
        let key = message
            .headers
            .as_ref()
            .and_then(|h| h.get(KEY_HEADER))
            .map(|v| v.to_string())
            .unwrap_or_default();

        let incoming = IncomingMessage {
            channel: self.channel.clone(),
            partition: 0,
            offset,
            key,
            payload: message.payload.clone(),
            headers,
            delivery_count,
        };

        Ok(Some(PendingMessage::new(incoming, move || {
            Box::pin(async move {
                message
                    .ack()
                    .await
                    .map_err(|e| RelayError::Ack(e.to_string()))
            })
        })))
    }
}
