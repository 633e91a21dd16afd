//! Error types for event-relay

use thiserror::Error;

/// Errors that can occur in the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish failure
    #[error("Failed to publish to channel '{channel}': {reason}")]
    Publish {
        channel: String,
        reason: String,
    },

    /// Subscribe failure
    #[error("Failed to subscribe to channel '{channel}': {reason}")]
    Subscribe {
        channel: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Acknowledgement failure
    #[error("Failed to acknowledge message: {0}")]
    Ack(String),

    /// Dead-letter publish failure
    #[error("Failed to dead-letter to channel '{channel}': {reason}")]
    DeadLetter {
        channel: String,
        reason: String,
    },

    /// Two handlers claim the same event kind at registration
    #[error("Handler conflict for event kind '{kind}': '{handler}' already registered by '{registered}'")]
    HandlerConflict {
        kind: String,
        handler: String,
        registered: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel/stream creation or management error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Consumer/subscription creation or management error
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
