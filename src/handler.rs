//! Event handler trait and the built-in logging handlers
//!
//! A handler declares the subtypes it processes via `supports` and
//! performs one business effect per event in `handle`. Handlers never
//! acknowledge; the dispatcher owns the commit decision.

use crate::event::{DomainEvent, OrderEvent, OrderEventKind, UserEvent, UserEventKind};
use async_trait::async_trait;
use thiserror::Error;

/// Business-level failure from a handler
///
/// The message ends up in the dead-letter error header when attempts
/// are exhausted, so it should say what failed, not where.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with a human-readable message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Result of one handler invocation
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Trait for event handlers
///
/// `supports` must be a pure predicate over the kind; the registry
/// snapshots its answers at registration time. Delivery is
/// at-least-once, so `handle` may see the same event id more than once
/// and must tolerate the duplicate.
#[async_trait]
pub trait EventHandler<E: DomainEvent>: Send + Sync {
    /// Stable handler name for logs and registration errors
    fn name(&self) -> &str;

    /// Whether this handler processes events of the given kind
    fn supports(&self, kind: E::Kind) -> bool;

    /// Process one event
    ///
    /// An `Err` marks the attempt failed; the dispatcher retries per its
    /// policy and dead-letters when attempts run out. Errors never
    /// propagate past the dispatcher.
    async fn handle(&self, event: &E) -> HandlerResult;
}

/// Built-in handler for the full user event category
///
/// Logs the account lifecycle transition per subtype.
#[derive(Debug, Default)]
pub struct UserEventLogger;

#[async_trait]
impl EventHandler<UserEvent> for UserEventLogger {
    fn name(&self) -> &str {
        "user-event-logger"
    }

    // The closed kind enum already scopes this to the user category.
    fn supports(&self, _kind: UserEventKind) -> bool {
        true
    }

    async fn handle(&self, event: &UserEvent) -> HandlerResult {
        match event.event_type {
            UserEventKind::UserCreated => {
                tracing::info!(
                    event_id = %event.id,
                    username = %event.username,
                    email = %event.email,
                    "User created"
                );
            }
            UserEventKind::UserUpdated => {
                tracing::info!(
                    event_id = %event.id,
                    username = %event.username,
                    "User updated"
                );
            }
            UserEventKind::UserDeleted => {
                tracing::info!(
                    event_id = %event.id,
                    username = %event.username,
                    "User deleted"
                );
            }
        }
        Ok(())
    }
}

/// Built-in handler for the full order event category
///
/// Logs the purchase lifecycle transition per subtype.
#[derive(Debug, Default)]
pub struct OrderEventLogger;

#[async_trait]
impl EventHandler<OrderEvent> for OrderEventLogger {
    fn name(&self) -> &str {
        "order-event-logger"
    }

    fn supports(&self, _kind: OrderEventKind) -> bool {
        true
    }

    async fn handle(&self, event: &OrderEvent) -> HandlerResult {
        match event.event_type {
            OrderEventKind::OrderCreated => {
                tracing::info!(
                    event_id = %event.id,
                    user_id = %event.user_id,
                    product = %event.product_name,
                    amount = %event.amount,
                    "Order created"
                );
            }
            OrderEventKind::OrderCompleted => {
                tracing::info!(
                    event_id = %event.id,
                    user_id = %event.user_id,
                    amount = %event.amount,
                    "Order completed"
                );
            }
            OrderEventKind::OrderCancelled => {
                tracing::info!(
                    event_id = %event.id,
                    user_id = %event.user_id,
                    "Order cancelled"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_user_logger_supports_every_user_kind() {
        let handler = UserEventLogger;
        for kind in UserEventKind::ALL {
            assert!(handler.supports(*kind));
        }
    }

    #[tokio::test]
    async fn test_order_logger_supports_every_order_kind() {
        let handler = OrderEventLogger;
        for kind in OrderEventKind::ALL {
            assert!(handler.supports(*kind));
        }
    }

    #[tokio::test]
    async fn test_user_logger_handles_event() {
        let handler = UserEventLogger;
        let event = UserEvent::new(UserEventKind::UserCreated, "alice", "alice@example.com");
        assert!(handler.handle(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_order_logger_handles_event() {
        let handler = OrderEventLogger;
        let event = OrderEvent::new(
            OrderEventKind::OrderCompleted,
            "evt-user-1",
            "keyboard",
            Decimal::new(4500, 2),
        );
        assert!(handler.handle(&event).await.is_ok());
    }

    #[test]
    fn test_handler_error_message() {
        let err = HandlerError::new("downstream unavailable");
        assert_eq!(err.message(), "downstream unavailable");
        assert_eq!(err.to_string(), "downstream unavailable");

        let from_str: HandlerError = "boom".into();
        assert_eq!(from_str.message(), "boom");
    }
}
