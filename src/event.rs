//! Core domain event types for the relay
//!
//! All types use camelCase JSON serialization for wire compatibility.
//! Event subtypes are closed enums; a payload whose `eventType` is not a
//! member of its category enum fails deserialization instead of leaking
//! an unclassifiable string into dispatch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Subtype discriminator of an event category
///
/// Each category (user, order) has its own closed enum. `ALL` lists every
/// variant so the handler registry can check coverage and reject overlap
/// at startup.
pub trait EventKind:
    Copy + Clone + fmt::Debug + fmt::Display + Eq + Hash + Send + Sync + 'static
{
    /// Every variant of this kind enum
    const ALL: &'static [Self];

    /// Stable wire/log form (e.g. `USER_CREATED`)
    fn as_str(&self) -> &'static str;
}

/// A typed domain event
///
/// Implemented by [`UserEvent`] and [`OrderEvent`]; new categories add a
/// struct, a kind enum, and an impl of this trait.
pub trait DomainEvent:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Subtype enum for this category
    type Kind: EventKind;

    /// Unique event identifier (`evt-<uuid>`), assigned at creation
    fn id(&self) -> &str;

    /// Correlation identifier (`cor-<uuid>`) propagated across services
    fn correlation_id(&self) -> &str;

    /// Subtype of this event
    fn kind(&self) -> Self::Kind;

    /// When the event was created by its publisher
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Subtypes of [`UserEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserEventKind {
    UserCreated,
    UserUpdated,
    UserDeleted,
}

impl EventKind for UserEventKind {
    const ALL: &'static [Self] = &[Self::UserCreated, Self::UserUpdated, Self::UserDeleted];

    fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "USER_CREATED",
            Self::UserUpdated => "USER_UPDATED",
            Self::UserDeleted => "USER_DELETED",
        }
    }
}

impl fmt::Display for UserEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subtypes of [`OrderEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    OrderCreated,
    OrderCompleted,
    OrderCancelled,
}

impl EventKind for OrderEventKind {
    const ALL: &'static [Self] = &[
        Self::OrderCreated,
        Self::OrderCompleted,
        Self::OrderCancelled,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "ORDER_CREATED",
            Self::OrderCompleted => "ORDER_COMPLETED",
            Self::OrderCancelled => "ORDER_CANCELLED",
        }
    }
}

impl fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account lifecycle event
///
/// Published to the user channel, keyed by `id`. Immutable after
/// construction; a changed value means a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    /// Unique event identifier (evt-<uuid>)
    pub id: String,

    /// Correlation identifier (cor-<uuid>) for cross-service tracing
    pub correlation_id: String,

    /// Event subtype
    pub event_type: UserEventKind,

    /// Account username
    pub username: String,

    /// Account email address
    pub email: String,

    /// Creation timestamp, assigned by the publisher
    pub timestamp: DateTime<Utc>,
}

impl UserEvent {
    /// Create a new event with auto-generated id, correlation id and timestamp
    pub fn new(
        event_type: UserEventKind,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: new_event_id(),
            correlation_id: new_correlation_id(),
            event_type,
            username: username.into(),
            email: email.into(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the minted correlation id with one carried forward from a
    /// triggering event
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

impl DomainEvent for UserEvent {
    type Kind = UserEventKind;

    fn id(&self) -> &str {
        &self.id
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn kind(&self) -> UserEventKind {
        self.event_type
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A purchase lifecycle event
///
/// `user_id` is a weak reference to a [`UserEvent`] id; no referential
/// integrity is enforced across channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    /// Unique event identifier (evt-<uuid>)
    pub id: String,

    /// Correlation identifier (cor-<uuid>) for cross-service tracing
    pub correlation_id: String,

    /// Event subtype
    pub event_type: OrderEventKind,

    /// Id of the user who placed the order
    pub user_id: String,

    /// Ordered product name
    pub product_name: String,

    /// Order amount, serialized as a decimal string to avoid float drift
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// Creation timestamp, assigned by the publisher
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    /// Create a new event with auto-generated id, correlation id and timestamp
    pub fn new(
        event_type: OrderEventKind,
        user_id: impl Into<String>,
        product_name: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: new_event_id(),
            correlation_id: new_correlation_id(),
            event_type,
            user_id: user_id.into(),
            product_name: product_name.into(),
            amount,
            timestamp: Utc::now(),
        }
    }

    /// Replace the minted correlation id with one carried forward from a
    /// triggering event
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

impl DomainEvent for OrderEvent {
    type Kind = OrderEventKind;

    fn id(&self) -> &str {
        &self.id
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn kind(&self) -> OrderEventKind {
        self.event_type
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn new_event_id() -> String {
    format!("evt-{}", uuid::Uuid::new_v4())
}

fn new_correlation_id() -> String {
    format!("cor-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_event_creation() {
        let event = UserEvent::new(UserEventKind::UserCreated, "alice", "alice@example.com");

        assert!(event.id.starts_with("evt-"));
        assert!(event.correlation_id.starts_with("cor-"));
        assert_ne!(event.id, event.correlation_id);
        assert_eq!(event.event_type, UserEventKind::UserCreated);
        assert_eq!(event.username, "alice");
        assert_eq!(event.email, "alice@example.com");
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = UserEvent::new(UserEventKind::UserCreated, "alice", "alice@example.com");
        let b = UserEvent::new(UserEventKind::UserCreated, "alice", "alice@example.com");
        assert_ne!(a.id, b.id);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn test_correlation_carry_forward() {
        let event = UserEvent::new(UserEventKind::UserUpdated, "bob", "bob@example.com")
            .with_correlation_id("cor-upstream");
        assert_eq!(event.correlation_id, "cor-upstream");
    }

    #[test]
    fn test_user_event_wire_format() {
        let event = UserEvent::new(UserEventKind::UserCreated, "alice", "alice@example.com");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"eventType\":\"USER_CREATED\""));
        assert!(json.contains("\"correlationId\":"));
        assert!(json.contains("\"username\":\"alice\""));

        let parsed: UserEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.event_type, UserEventKind::UserCreated);
    }

    #[test]
    fn test_order_event_wire_format() {
        let amount: Decimal = "99.99".parse().unwrap();
        let event = OrderEvent::new(OrderEventKind::OrderCreated, "evt-user-1", "laptop", amount);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"eventType\":\"ORDER_CREATED\""));
        assert!(json.contains("\"userId\":\"evt-user-1\""));
        assert!(json.contains("\"productName\":\"laptop\""));
        assert!(json.contains("\"amount\":\"99.99\""));

        let parsed: OrderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.amount, amount);
        assert_eq!(parsed.kind(), OrderEventKind::OrderCreated);
    }

    #[test]
    fn test_unknown_kind_fails_deserialization() {
        let json = r#"{
            "id": "evt-123",
            "correlationId": "cor-123",
            "eventType": "USER_ARCHIVED",
            "username": "alice",
            "email": "alice@example.com",
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;

        assert!(serde_json::from_str::<UserEvent>(json).is_err());
    }

    #[test]
    fn test_kind_all_covers_every_variant() {
        assert_eq!(UserEventKind::ALL.len(), 3);
        assert_eq!(OrderEventKind::ALL.len(), 3);
        assert!(UserEventKind::ALL.contains(&UserEventKind::UserDeleted));
        assert!(OrderEventKind::ALL.contains(&OrderEventKind::OrderCancelled));
    }

    #[test]
    fn test_kind_display_matches_wire_form() {
        assert_eq!(UserEventKind::UserCreated.to_string(), "USER_CREATED");
        assert_eq!(OrderEventKind::OrderCancelled.to_string(), "ORDER_CANCELLED");
    }
}
