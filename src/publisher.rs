//! Event publisher — wrap validated requests and send them keyed by id
//!
//! The publisher owns event identity: it mints the event id and
//! timestamp, and mints or forwards the correlation id. Sends are not
//! retried here; a retry on an asynchronous send is a double-publish
//! hazard, so failures go back to the caller untouched.

use crate::config::ChannelNames;
use crate::error::Result;
use crate::event::{DomainEvent, OrderEvent, OrderEventKind, UserEvent, UserEventKind};
use crate::metrics::RelayMetrics;
use crate::transport::ChannelTransport;
use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Validated request to publish a user event
///
/// Arrives pre-validated from the API layer; the publisher does not
/// re-validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEventRequest {
    /// Account username
    pub username: String,

    /// Account email address
    pub email: String,

    /// Event subtype
    pub event_type: UserEventKind,

    /// Correlation id carried forward from a triggering event, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Validated request to publish an order event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEventRequest {
    /// Id of the user who placed the order
    pub user_id: String,

    /// Ordered product name
    pub product_name: String,

    /// Order amount
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Event subtype
    pub event_type: OrderEventKind,

    /// Correlation id carried forward from a triggering event, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// Confirmation returned to the caller after a successful publish
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Id assigned to the published event
    pub event_id: String,

    /// Correlation id the event carries
    pub correlation_id: String,

    /// Partition the event landed on
    pub partition: u32,

    /// Offset assigned by the transport
    pub offset: u64,
}

/// Publishes typed events to their category channels
pub struct EventPublisher {
    transport: Arc<dyn ChannelTransport>,
    channels: ChannelNames,
    metrics: Arc<RelayMetrics>,
}

impl EventPublisher {
    /// Create a publisher with a fresh metrics registry
    pub fn new(transport: Arc<dyn ChannelTransport>, channels: ChannelNames) -> Self {
        Self {
            transport,
            channels,
            metrics: Arc::new(RelayMetrics::new()),
        }
    }

    /// Share a metrics registry with other components
    pub fn with_metrics(mut self, metrics: Arc<RelayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics recorded by this publisher
    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Build and publish a user event
    pub async fn publish_user_event(&self, request: UserEventRequest) -> Result<PublishReceipt> {
        let mut event = UserEvent::new(request.event_type, request.username, request.email);
        if let Some(correlation_id) = request.correlation_id {
            event = event.with_correlation_id(correlation_id);
        }
        self.publish(&self.channels.user_events, &event).await
    }

    /// Build and publish an order event
    pub async fn publish_order_event(&self, request: OrderEventRequest) -> Result<PublishReceipt> {
        let mut event = OrderEvent::new(
            request.event_type,
            request.user_id,
            request.product_name,
            request.amount,
        );
        if let Some(correlation_id) = request.correlation_id {
            event = event.with_correlation_id(correlation_id);
        }
        self.publish(&self.channels.order_events, &event).await
    }

    /// Publish an already-constructed event, keyed by its id
    ///
    /// The event id doubles as the transport deduplication id where the
    /// transport supports one, so a caller resubmitting the same event
    /// after an ambiguous failure cannot double-deliver within the
    /// dedup window.
    pub async fn publish<E: DomainEvent>(&self, channel: &str, event: &E) -> Result<PublishReceipt> {
        let payload = Bytes::from(serde_json::to_vec(event)?);
        match self.transport.send(channel, event.id(), payload).await {
            Ok(receipt) => {
                self.metrics.record_published();
                tracing::info!(
                    event_id = %event.id(),
                    correlation_id = %event.correlation_id(),
                    kind = %event.kind(),
                    channel = %channel,
                    partition = receipt.partition,
                    offset = receipt.offset,
                    "Event published"
                );
                Ok(PublishReceipt {
                    event_id: event.id().to_string(),
                    correlation_id: event.correlation_id().to_string(),
                    partition: receipt.partition,
                    offset: receipt.offset,
                })
            }
            Err(e) => {
                self.metrics.record_publish_error();
                tracing::error!(
                    event_id = %event.id(),
                    kind = %event.kind(),
                    channel = %channel,
                    error = %e,
                    "Publish failed"
                );
                Err(e)
            }
        }
    }
}
