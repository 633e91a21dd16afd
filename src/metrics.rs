//! Relay metrics — lightweight atomic counters
//!
//! No export wiring here; callers snapshot the counters and expose them
//! however they like (logs, health endpoint, tests).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by publisher and dispatcher
#[derive(Debug, Default)]
pub struct RelayMetrics {
    published: AtomicU64,
    publish_errors: AtomicU64,
    handled: AtomicU64,
    unmatched: AtomicU64,
    retries: AtomicU64,
    dead_lettered: AtomicU64,
    dead_letter_errors: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Events sent to their category channel
    pub published: u64,
    /// Publisher send failures
    pub publish_errors: u64,
    /// Events a handler processed successfully
    pub handled: u64,
    /// Events acknowledged without a matching handler
    pub unmatched: u64,
    /// Handler retries performed (excludes first attempts)
    pub retries: u64,
    /// Events parked on a dead-letter channel
    pub dead_lettered: u64,
    /// Dead-letter publishes that failed
    pub dead_letter_errors: u64,
}

impl RelayMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter_error(&self) {
        self.dead_letter_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dead_letter_errors: self.dead_letter_errors.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.publish_errors.store(0, Ordering::Relaxed);
        self.handled.store(0, Ordering::Relaxed);
        self.unmatched.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.dead_lettered.store(0, Ordering::Relaxed);
        self.dead_letter_errors.store(0, Ordering::Relaxed);
    }
}
