//! # event-relay
//!
//! Typed event publishing, dispatch, and dead-letter handling over
//! pluggable channel transports.
//!
//! ## Overview
//!
//! The producer side wraps validated requests into typed domain events
//! and publishes them to named channels. The consumer side dispatches
//! each event to exactly one handler selected by the event's kind,
//! acknowledges on success (or when no handler matches), retries with
//! exponential backoff on failure, and parks exhausted events on a
//! dead-letter channel derived from the source channel name.
//!
//! ## Quick Start
//!
//! ```rust
//! use event_relay::transport::memory::MemoryTransport;
//! use event_relay::{ChannelNames, EventPublisher, UserEventKind, UserEventRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> event_relay::Result<()> {
//! let transport = Arc::new(MemoryTransport::default());
//! let publisher = EventPublisher::new(transport, ChannelNames::default());
//!
//! let receipt = publisher
//!     .publish_user_event(UserEventRequest {
//!         username: "alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         event_type: UserEventKind::UserCreated,
//!         correlation_id: None,
//!     })
//!     .await?;
//!
//! println!("Published: {} at offset {}", receipt.event_id, receipt.offset);
//! # Ok(())
//! # }
//! ```
//!
//! ## Transports
//!
//! - **memory** — Partitioned in-memory transport for testing and
//!   single-process use
//! - **nats** — NATS JetStream for distributed, persistent delivery
//!
//! ## Architecture
//!
//! - **ChannelTransport** trait — keyed send, group subscribe, explicit
//!   commit; all a broker needs to offer
//! - **EventPublisher** — mints event identity and publishes keyed by
//!   event id, no internal retry
//! - **HandlerRegistry** — kind-to-handler map, overlap rejected at
//!   startup
//! - **Dispatcher** — decode, match, retry with backoff, dead-letter,
//!   acknowledge
//! - **ChannelConsumer** — fixed pool of workers, one message at a time
//!   per worker

pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod dlq;
pub mod envelope;
pub mod error;
pub mod event;
pub mod handler;
pub mod metrics;
pub mod publisher;
pub mod registry;
pub mod retry;
pub mod transport;

// Re-export core types
pub use config::{ChannelNames, ConsumerSettings, RelayConfig};
pub use consumer::{ChannelConsumer, ConsumerHandle};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use dlq::{dead_letter_channel, DeadLetterPolicy, DeadLetterPublisher};
pub use envelope::Delivery;
pub use error::{RelayError, Result};
pub use event::{DomainEvent, EventKind, OrderEvent, OrderEventKind, UserEvent, UserEventKind};
pub use handler::{EventHandler, HandlerError, HandlerResult, OrderEventLogger, UserEventLogger};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use publisher::{EventPublisher, OrderEventRequest, PublishReceipt, UserEventRequest};
pub use registry::HandlerRegistry;
pub use retry::RetryPolicy;
pub use transport::{
    ChannelSubscription, ChannelTransport, IncomingMessage, MessageHeaders, PendingMessage,
    SendReceipt,
};

// Re-export transports for convenience
pub use transport::memory::{MemoryConfig, MemoryTransport};
pub use transport::nats::{NatsClient, NatsConfig, NatsSubscription, NatsTransport, StorageType};
