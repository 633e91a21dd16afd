//! Dispatcher — per-event match, retry, dead-letter and acknowledgment
//!
//! Every delivered message moves through one pass of this state machine:
//! decode, resolve a handler by kind, invoke it with exponential backoff
//! on failure, then either acknowledge (handled, unmatched, or
//! dead-lettered) or leave the offset uncommitted for redelivery.
//! Handler errors never escape; only transport failures propagate to the
//! worker loop.

use crate::dlq::DeadLetterPublisher;
use crate::envelope::Delivery;
use crate::error::Result;
use crate::event::DomainEvent;
use crate::metrics::RelayMetrics;
use crate::registry::HandlerRegistry;
use crate::retry::RetryPolicy;
use crate::transport::PendingMessage;
use chrono::Utc;
use std::sync::Arc;

/// Terminal classification of one dispatched message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler processed the event
    Handled {
        /// Handler invocations consumed (1 = first attempt succeeded)
        attempts: u32,
    },

    /// No handler claims the event kind; acknowledged without processing
    Unmatched,

    /// Attempts exhausted (or payload undecodable); parked on the
    /// dead-letter channel and acknowledged
    DeadLettered {
        /// Handler invocations consumed (0 for undecodable payloads)
        attempts: u32,
    },

    /// Dead-letter publish failed and policy acknowledged the source
    /// anyway; the event is gone
    Lost {
        /// Handler invocations consumed
        attempts: u32,
    },
}

/// Drives received messages through handlers for one event category
pub struct Dispatcher<E: DomainEvent> {
    registry: Arc<HandlerRegistry<E>>,
    retry: RetryPolicy,
    dead_letters: DeadLetterPublisher,
    metrics: Arc<RelayMetrics>,
}

impl<E: DomainEvent> Dispatcher<E> {
    /// Create a dispatcher with a fresh metrics registry
    pub fn new(
        registry: Arc<HandlerRegistry<E>>,
        retry: RetryPolicy,
        dead_letters: DeadLetterPublisher,
    ) -> Self {
        Self {
            registry,
            retry,
            dead_letters,
            metrics: Arc::new(RelayMetrics::new()),
        }
    }

    /// Share a metrics registry with other components
    pub fn with_metrics(mut self, metrics: Arc<RelayMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics recorded by this dispatcher
    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Process one delivered message to a terminal outcome
    ///
    /// Returns `Err` only for transport failures (acknowledgement, or a
    /// failed dead-letter publish under `ack_on_failure = false`); the
    /// message is then redelivered by the transport later.
    pub async fn dispatch(&self, pending: PendingMessage) -> Result<DispatchOutcome> {
        let message = pending.message.clone();

        let event: E = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(decode_err) => {
                // poison message: retrying a parse failure cannot succeed
                tracing::warn!(
                    key = %message.key,
                    channel = %message.channel,
                    partition = message.partition,
                    offset = message.offset,
                    error = %decode_err,
                    "Undecodable payload, dead-lettering"
                );
                return self
                    .dead_letter_and_commit(pending, &decode_err.to_string(), 0)
                    .await;
            }
        };

        let mut delivery = Delivery::new(event, &message);

        let handler = match self.registry.resolve(delivery.event.kind()) {
            Some(handler) => Arc::clone(handler),
            None => {
                tracing::warn!(
                    event_id = %delivery.event.id(),
                    kind = %delivery.event.kind(),
                    channel = %delivery.channel,
                    "No handler for event kind"
                );
                self.metrics.record_unmatched();
                pending.commit().await?;
                return Ok(DispatchOutcome::Unmatched);
            }
        };

        tracing::debug!(
            event_id = %delivery.event.id(),
            correlation_id = %delivery.event.correlation_id(),
            kind = %delivery.event.kind(),
            handler = %handler.name(),
            delivery_count = delivery.delivery_count,
            "Event matched"
        );

        loop {
            let attempt = delivery.begin_attempt();
            match handler.handle(&delivery.event).await {
                Ok(()) => {
                    self.metrics.record_handled();
                    let elapsed = (Utc::now() - delivery.first_seen_at).num_milliseconds();
                    tracing::info!(
                        event_id = %delivery.event.id(),
                        correlation_id = %delivery.event.correlation_id(),
                        kind = %delivery.event.kind(),
                        handler = %handler.name(),
                        attempt,
                        duration_ms = elapsed,
                        "Event handled"
                    );
                    pending.commit().await?;
                    return Ok(DispatchOutcome::Handled { attempts: attempt });
                }
                Err(err) => {
                    if self.retry.exhausted(attempt) {
                        return self
                            .dead_letter_and_commit(pending, err.message(), attempt)
                            .await;
                    }
                    let delay = self.retry.delay_after(attempt);
                    self.metrics.record_retry();
                    tracing::warn!(
                        event_id = %delivery.event.id(),
                        kind = %delivery.event.kind(),
                        handler = %handler.name(),
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "Handler failed, will retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Park the message on the dead-letter channel, then settle the
    /// source offset per policy
    async fn dead_letter_and_commit(
        &self,
        pending: PendingMessage,
        error: &str,
        attempts: u32,
    ) -> Result<DispatchOutcome> {
        match self.dead_letters.publish(&pending.message, error, attempts).await {
            Ok(_) => {
                self.metrics.record_dead_lettered();
                pending.commit().await?;
                Ok(DispatchOutcome::DeadLettered { attempts })
            }
            Err(publish_err) => {
                self.metrics.record_dead_letter_error();
                if self.dead_letters.ack_on_failure() {
                    tracing::error!(
                        key = %pending.message.key,
                        channel = %pending.message.channel,
                        "Source acknowledged without dead-letter capture"
                    );
                    pending.commit().await?;
                    Ok(DispatchOutcome::Lost { attempts })
                } else {
                    // uncommitted: the transport will redeliver
                    drop(pending);
                    Err(publish_err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlq::{DeadLetterPolicy, HEADER_ATTEMPTS, HEADER_ERROR};
    use crate::error::RelayError;
    use crate::event::{UserEvent, UserEventKind};
    use crate::handler::{EventHandler, HandlerResult};
    use crate::transport::memory::{MemoryConfig, MemoryTransport};
    use crate::transport::{ChannelSubscription, ChannelTransport, MessageHeaders, SendReceipt};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    /// Fails the first `fail_times` attempts, then succeeds
    struct FlakyHandler {
        fail_times: u32,
        calls: AtomicU32,
    }

    impl FlakyHandler {
        fn new(fail_times: u32) -> Self {
            Self {
                fail_times,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl EventHandler<UserEvent> for FlakyHandler {
        fn name(&self) -> &str {
            "flaky"
        }

        fn supports(&self, kind: UserEventKind) -> bool {
            kind == UserEventKind::UserCreated
        }

        async fn handle(&self, _event: &UserEvent) -> HandlerResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_times {
                Err(format!("transient failure {call}").into())
            } else {
                Ok(())
            }
        }
    }

    /// Refuses sends to dead-letter channels, delegates everything else
    struct DlqOutage {
        inner: MemoryTransport,
    }

    #[async_trait]
    impl ChannelTransport for DlqOutage {
        async fn send_with_headers(
            &self,
            channel: &str,
            key: &str,
            payload: Bytes,
            headers: &MessageHeaders,
        ) -> crate::error::Result<SendReceipt> {
            if channel.ends_with(".DLQ") {
                return Err(RelayError::Publish {
                    channel: channel.to_string(),
                    reason: "dead-letter channel unavailable".to_string(),
                });
            }
            self.inner
                .send_with_headers(channel, key, payload, headers)
                .await
        }

        async fn subscribe(
            &self,
            channel: &str,
            group: &str,
        ) -> crate::error::Result<Box<dyn ChannelSubscription>> {
            self.inner.subscribe(channel, group).await
        }

        async fn health(&self) -> crate::error::Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "dlq-outage"
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(5),
            multiplier: 2,
            max_delay: Duration::from_millis(20),
            max_attempts,
        }
    }

    fn dispatcher_over(
        transport: Arc<dyn ChannelTransport>,
        handler: Arc<dyn EventHandler<UserEvent>>,
        max_attempts: u32,
        ack_on_failure: bool,
    ) -> Dispatcher<UserEvent> {
        let mut registry = HandlerRegistry::new();
        registry.register(handler).unwrap();
        Dispatcher::new(
            Arc::new(registry),
            fast_retry(max_attempts),
            DeadLetterPublisher::new(
                transport,
                DeadLetterPolicy {
                    ack_on_failure,
                    ..DeadLetterPolicy::default()
                },
            ),
        )
    }

    async fn deliver_one(
        transport: &MemoryTransport,
        event: &UserEvent,
    ) -> PendingMessage {
        let payload = Bytes::from(serde_json::to_vec(event).unwrap());
        transport
            .send("user-events", &event.id, payload)
            .await
            .unwrap();
        let mut sub = transport.subscribe("user-events", "g1").await.unwrap();
        sub.next().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_handled_on_first_attempt() {
        let transport = Arc::new(MemoryTransport::default());
        let handler = Arc::new(FlakyHandler::new(0));
        let dispatcher = dispatcher_over(transport.clone(), handler.clone(), 3, true);

        let event = UserEvent::new(UserEventKind::UserCreated, "alice", "alice@example.com");
        let pending = deliver_one(&transport, &event).await;

        let outcome = dispatcher.dispatch(pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Handled { attempts: 1 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.metrics().snapshot().handled, 1);
        assert_eq!(transport.message_count("user-events.DLQ"), 0);
    }

    #[tokio::test]
    async fn test_unmatched_acks_without_invocation() {
        let transport = Arc::new(MemoryTransport::new(MemoryConfig { partitions: 1 }));
        let handler = Arc::new(FlakyHandler::new(0)); // supports UserCreated only
        let dispatcher = dispatcher_over(transport.clone(), handler.clone(), 3, true);

        let event = UserEvent::new(UserEventKind::UserDeleted, "bob", "bob@example.com");
        let pending = deliver_one(&transport, &event).await;

        let outcome = dispatcher.dispatch(pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Unmatched);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.metrics().snapshot().unmatched, 1);

        // committed: a fresh subscription in the same group sees nothing
        let mut sub = transport.subscribe("user-events", "g1").await.unwrap();
        assert!(timeout(Duration::from_millis(50), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let transport = Arc::new(MemoryTransport::default());
        let handler = Arc::new(FlakyHandler::new(2));
        let dispatcher = dispatcher_over(transport.clone(), handler.clone(), 3, true);

        let event = UserEvent::new(UserEventKind::UserCreated, "carol", "carol@example.com");
        let pending = deliver_one(&transport, &event).await;

        let outcome = dispatcher.dispatch(pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Handled { attempts: 3 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.metrics().snapshot().retries, 2);
        assert_eq!(transport.message_count("user-events.DLQ"), 0);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_dead_letter() {
        let transport = Arc::new(MemoryTransport::default());
        let handler = Arc::new(FlakyHandler::new(u32::MAX));
        let dispatcher = dispatcher_over(transport.clone(), handler.clone(), 3, true);

        let event = UserEvent::new(UserEventKind::UserCreated, "dave", "dave@example.com");
        let payload = Bytes::from(serde_json::to_vec(&event).unwrap());
        let pending = deliver_one(&transport, &event).await;

        let outcome = dispatcher.dispatch(pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::DeadLettered { attempts: 3 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        let mut dlq = transport
            .subscribe("user-events.DLQ", "probe")
            .await
            .unwrap();
        let dead = dlq.next().await.unwrap().unwrap();
        assert_eq!(dead.message.payload, payload);
        assert_eq!(dead.message.key, event.id);
        assert_eq!(dead.message.headers[HEADER_ATTEMPTS], "3");
        assert_eq!(dead.message.headers[HEADER_ERROR], "transient failure 3");
        dead.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_payload_dead_letters_immediately() {
        let transport = Arc::new(MemoryTransport::default());
        let handler = Arc::new(FlakyHandler::new(0));
        let dispatcher = dispatcher_over(transport.clone(), handler.clone(), 3, true);

        transport
            .send("user-events", "bad-key", Bytes::from_static(b"not json"))
            .await
            .unwrap();
        let mut sub = transport.subscribe("user-events", "g1").await.unwrap();
        let pending = sub.next().await.unwrap().unwrap();

        let outcome = dispatcher.dispatch(pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::DeadLettered { attempts: 0 });
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.message_count("user-events.DLQ"), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_outage_ack_anyway() {
        let inner = MemoryTransport::default();
        let transport = Arc::new(DlqOutage {
            inner: inner.clone(),
        });
        let handler = Arc::new(FlakyHandler::new(u32::MAX));
        let dispatcher = dispatcher_over(transport, handler, 2, true);

        let event = UserEvent::new(UserEventKind::UserCreated, "erin", "erin@example.com");
        let pending = deliver_one(&inner, &event).await;

        let outcome = dispatcher.dispatch(pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Lost { attempts: 2 });
        assert_eq!(dispatcher.metrics().snapshot().dead_letter_errors, 1);

        // acknowledged: no redelivery on the source channel
        let mut sub = inner.subscribe("user-events", "g1").await.unwrap();
        assert!(timeout(Duration::from_millis(50), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_dead_letter_outage_holds_offset() {
        let inner = MemoryTransport::new(MemoryConfig { partitions: 1 });
        let transport = Arc::new(DlqOutage {
            inner: inner.clone(),
        });
        let handler = Arc::new(FlakyHandler::new(u32::MAX));
        let dispatcher = dispatcher_over(transport, handler, 2, false);

        let event = UserEvent::new(UserEventKind::UserCreated, "frank", "frank@example.com");
        let pending = deliver_one(&inner, &event).await;

        let err = dispatcher.dispatch(pending).await.unwrap_err();
        assert!(matches!(err, RelayError::DeadLetter { .. }));

        // offset held: the same message comes back for another round
        let mut sub = inner.subscribe("user-events", "g1").await.unwrap();
        let redelivered = timeout(Duration::from_millis(500), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(redelivered.message.key, event.id);
        assert!(redelivered.message.delivery_count > 1);
        redelivered.commit().await.unwrap();
    }
}
