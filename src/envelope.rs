//! Delivery envelope — per-message dispatch state
//!
//! Retry state travels with the message instead of living in shared
//! counters keyed by message identity, so concurrent workers never
//! contend and a redelivered message starts counting attempts anew.

use crate::event::DomainEvent;
use crate::transport::IncomingMessage;
use chrono::{DateTime, Utc};

/// A decoded event moving through dispatch
#[derive(Debug, Clone)]
pub struct Delivery<E: DomainEvent> {
    /// The decoded event
    pub event: E,

    /// Handler invocations so far for this delivery (1 = first attempt)
    pub attempt: u32,

    /// When this delivery entered dispatch
    pub first_seen_at: DateTime<Utc>,

    /// Channel the message was consumed from
    pub channel: String,

    /// Partition it was read from
    pub partition: u32,

    /// Transport-assigned offset
    pub offset: u64,

    /// Transport-level delivery attempt (grows on redelivery)
    pub delivery_count: u64,
}

impl<E: DomainEvent> Delivery<E> {
    /// Wrap a decoded event with its transport context
    pub fn new(event: E, message: &IncomingMessage) -> Self {
        Self {
            event,
            attempt: 0,
            first_seen_at: Utc::now(),
            channel: message.channel.clone(),
            partition: message.partition,
            offset: message.offset,
            delivery_count: message.delivery_count,
        }
    }

    /// Record the start of the next handler attempt, returning its number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }
}
