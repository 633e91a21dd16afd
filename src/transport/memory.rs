//! In-memory channel transport
//!
//! Models the delivery semantics the relay core assumes from a real
//! broker: keyed partition assignment, per-partition ordering, competing
//! consumers within a group, and at-least-once redelivery of
//! uncommitted messages. Each channel is a set of append-only partition
//! logs; each group keeps a committed cursor and a fetch cursor per
//! partition. Dropping an uncommitted [`PendingMessage`] rewinds the
//! fetch cursor, so the message is delivered again.
//!
//! Used by tests and local development; production deployments use the
//! NATS transport.

use crate::error::{RelayError, Result};
use crate::transport::{
    ChannelSubscription, ChannelTransport, IncomingMessage, MessageHeaders, PendingMessage,
    SendReceipt,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Configuration for the in-memory transport
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Partitions per channel (at least 1)
    pub partitions: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { partitions: 3 }
    }
}

/// A message stored in a partition log
#[derive(Debug, Clone)]
struct StoredMessage {
    offset: u64,
    key: String,
    payload: Bytes,
    headers: MessageHeaders,
}

/// Per-group delivery cursors for one channel
///
/// Invariant per partition: `committed <= fetched <= committed + 1`.
/// A partition with an in-flight message is not fetched from again
/// until the message is committed or its handle is dropped.
#[derive(Debug)]
struct GroupState {
    committed: Vec<u64>,
    fetched: Vec<u64>,
    in_flight: Vec<bool>,
    deliveries: Vec<HashMap<u64, u64>>,
}

impl GroupState {
    fn new(partitions: usize) -> Self {
        Self {
            committed: vec![0; partitions],
            fetched: vec![0; partitions],
            in_flight: vec![false; partitions],
            deliveries: (0..partitions).map(|_| HashMap::new()).collect(),
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    partitions: Vec<Vec<StoredMessage>>,
    groups: HashMap<String, GroupState>,
}

impl ChannelState {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions).map(|_| Vec::new()).collect(),
            groups: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    partitions: u32,
    channels: Mutex<HashMap<String, ChannelState>>,
    wakeup: Notify,
}

impl Inner {
    fn lock_channels(&self) -> Result<MutexGuard<'_, HashMap<String, ChannelState>>> {
        self.channels
            .lock()
            .map_err(|_| RelayError::Channel("channel state lock poisoned".to_string()))
    }
}

/// In-memory implementation of [`ChannelTransport`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    /// Create a transport with the given configuration
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                partitions: config.partitions.max(1),
                channels: Mutex::new(HashMap::new()),
                wakeup: Notify::new(),
            }),
        }
    }

    /// Total messages ever appended to a channel, across partitions
    pub fn message_count(&self, channel: &str) -> usize {
        match self.inner.channels.lock() {
            Ok(channels) => channels
                .get(channel)
                .map(|state| state.partitions.iter().map(Vec::len).sum())
                .unwrap_or(0),
            Err(_) => 0,
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

fn partition_for(key: &str, partitions: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % u64::from(partitions)) as u32
}

#[async_trait]
impl ChannelTransport for MemoryTransport {
    async fn send_with_headers(
        &self,
        channel: &str,
        key: &str,
        payload: Bytes,
        headers: &MessageHeaders,
    ) -> Result<SendReceipt> {
        let partition = partition_for(key, self.inner.partitions);
        let offset;
        {
            let mut channels = self.inner.lock_channels()?;
            let state = channels
                .entry(channel.to_string())
                .or_insert_with(|| ChannelState::new(self.inner.partitions as usize));
            let log = &mut state.partitions[partition as usize];
            offset = log.len() as u64;
            log.push(StoredMessage {
                offset,
                key: key.to_string(),
                payload,
                headers: headers.clone(),
            });
        }
        self.inner.wakeup.notify_waiters();
        Ok(SendReceipt { partition, offset })
    }

    async fn subscribe(&self, channel: &str, group: &str) -> Result<Box<dyn ChannelSubscription>> {
        {
            let mut channels = self.inner.lock_channels()?;
            let state = channels
                .entry(channel.to_string())
                .or_insert_with(|| ChannelState::new(self.inner.partitions as usize));
            state
                .groups
                .entry(group.to_string())
                .or_insert_with(|| GroupState::new(self.inner.partitions as usize));
        }
        Ok(Box::new(MemorySubscription {
            inner: Arc::clone(&self.inner),
            channel: channel.to_string(),
            group: group.to_string(),
            scan_from: 0,
        }))
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// One group member consuming a channel
struct MemorySubscription {
    inner: Arc<Inner>,
    channel: String,
    group: String,
    scan_from: usize,
}

impl MemorySubscription {
    /// Fetch the next available message from any unclaimed partition
    fn try_fetch(&mut self) -> Result<Option<PendingMessage>> {
        let mut channels = self.inner.lock_channels()?;
        let state = match channels.get_mut(&self.channel) {
            Some(state) => state,
            None => return Ok(None),
        };
        let ChannelState { partitions, groups } = state;
        let group = groups
            .entry(self.group.clone())
            .or_insert_with(|| GroupState::new(partitions.len()));

        let count = partitions.len();
        for i in 0..count {
            let p = (self.scan_from + i) % count;
            if group.in_flight[p] {
                continue;
            }
            let next = group.fetched[p];
            let log = &partitions[p];
            if (next as usize) >= log.len() {
                continue;
            }

            let stored = log[next as usize].clone();
            group.in_flight[p] = true;
            group.fetched[p] = next + 1;
            let delivered = group.deliveries[p].entry(next).or_insert(0);
            *delivered += 1;
            let delivery_count = *delivered;
            self.scan_from = (p + 1) % count;

            let message = IncomingMessage {
                channel: self.channel.clone(),
                partition: p as u32,
                offset: stored.offset,
                key: stored.key,
                payload: stored.payload,
                headers: stored.headers,
                delivery_count,
            };
            let guard = InFlightGuard {
                inner: Arc::clone(&self.inner),
                channel: self.channel.clone(),
                group: self.group.clone(),
                partition: p,
                offset: stored.offset,
                committed: false,
            };
            return Ok(Some(PendingMessage::new(message, move || {
                Box::pin(async move { guard.commit() })
            })));
        }
        Ok(None)
    }
}

#[async_trait]
impl ChannelSubscription for MemorySubscription {
    async fn next(&mut self) -> Result<Option<PendingMessage>> {
        loop {
            let inner = Arc::clone(&self.inner);
            let notified = inner.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(pending) = self.try_fetch()? {
                return Ok(Some(pending));
            }
            notified.as_mut().await;
        }
    }
}

/// Claim on one partition for one delivered message
///
/// Commit advances the group's committed cursor; dropping without commit
/// rewinds the fetch cursor so the message is redelivered.
struct InFlightGuard {
    inner: Arc<Inner>,
    channel: String,
    group: String,
    partition: usize,
    offset: u64,
    committed: bool,
}

impl InFlightGuard {
    fn commit(mut self) -> Result<()> {
        {
            let mut channels = self.inner.lock_channels().map_err(|_| {
                RelayError::Ack("channel state lock poisoned during commit".to_string())
            })?;
            if let Some(state) = channels.get_mut(&self.channel) {
                if let Some(group) = state.groups.get_mut(&self.group) {
                    let p = self.partition;
                    group.committed[p] = self.offset + 1;
                    group.fetched[p] = self.offset + 1;
                    group.in_flight[p] = false;
                    group.deliveries[p].remove(&self.offset);
                }
            }
        }
        self.committed = true;
        self.inner.wakeup.notify_waiters();
        Ok(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Ok(mut channels) = self.inner.channels.lock() {
            if let Some(state) = channels.get_mut(&self.channel) {
                if let Some(group) = state.groups.get_mut(&self.group) {
                    let p = self.partition;
                    group.fetched[p] = group.committed[p];
                    group.in_flight[p] = false;
                }
            }
        }
        self.inner.wakeup.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn payload(s: &str) -> Bytes {
        Bytes::from(s.to_string().into_bytes())
    }

    #[tokio::test]
    async fn test_send_receive_commit() {
        let transport = MemoryTransport::default();
        let receipt = transport
            .send("user-events", "evt-1", payload("hello"))
            .await
            .unwrap();
        assert_eq!(receipt.offset, 0);

        let mut sub = transport.subscribe("user-events", "g1").await.unwrap();
        let pending = sub.next().await.unwrap().unwrap();
        assert_eq!(pending.message.key, "evt-1");
        assert_eq!(pending.message.payload, payload("hello"));
        assert_eq!(pending.message.delivery_count, 1);
        pending.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_same_key_same_partition() {
        let transport = MemoryTransport::default();
        let a = transport
            .send("orders", "evt-key", payload("a"))
            .await
            .unwrap();
        let b = transport
            .send("orders", "evt-key", payload("b"))
            .await
            .unwrap();
        assert_eq!(a.partition, b.partition);
        assert_eq!(b.offset, a.offset + 1);
    }

    #[tokio::test]
    async fn test_uncommitted_drop_redelivers() {
        let transport = MemoryTransport::new(MemoryConfig { partitions: 1 });
        transport
            .send("orders", "evt-1", payload("x"))
            .await
            .unwrap();

        let mut sub = transport.subscribe("orders", "g1").await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.message.delivery_count, 1);
        drop(first);

        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.message.offset, 0);
        assert_eq!(second.message.delivery_count, 2);
        second.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_partition_claim_blocks_until_commit() {
        let transport = MemoryTransport::new(MemoryConfig { partitions: 1 });
        transport.send("orders", "k", payload("a")).await.unwrap();
        transport.send("orders", "k", payload("b")).await.unwrap();

        let mut sub = transport.subscribe("orders", "g1").await.unwrap();
        let first = sub.next().await.unwrap().unwrap();

        // second message sits behind the in-flight claim
        let mut other = transport.subscribe("orders", "g1").await.unwrap();
        assert!(timeout(Duration::from_millis(50), other.next())
            .await
            .is_err());

        first.commit().await.unwrap();
        let second = timeout(Duration::from_millis(500), other.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(second.message.payload, payload("b"));
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let transport = MemoryTransport::default();
        transport
            .send("user-events", "evt-1", payload("x"))
            .await
            .unwrap();

        let mut g1 = transport.subscribe("user-events", "g1").await.unwrap();
        let mut g2 = transport.subscribe("user-events", "g2").await.unwrap();

        let a = g1.next().await.unwrap().unwrap();
        let b = g2.next().await.unwrap().unwrap();
        assert_eq!(a.message.offset, b.message.offset);
        a.commit().await.unwrap();
        b.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_before_send() {
        let transport = MemoryTransport::default();
        let mut sub = transport.subscribe("user-events", "g1").await.unwrap();

        let t = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            t.send("user-events", "evt-1", payload("late"))
                .await
                .unwrap();
        });

        let pending = timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(pending.message.payload, payload("late"));
        pending.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_message_count() {
        let transport = MemoryTransport::default();
        assert_eq!(transport.message_count("orders"), 0);
        transport.send("orders", "a", payload("1")).await.unwrap();
        transport.send("orders", "b", payload("2")).await.unwrap();
        assert_eq!(transport.message_count("orders"), 2);
        assert_eq!(transport.message_count("other"), 0);
    }

    #[test]
    fn test_partition_for_is_stable() {
        let p1 = partition_for("evt-abc", 3);
        let p2 = partition_for("evt-abc", 3);
        assert_eq!(p1, p2);
        assert!(p1 < 3);
    }
}
