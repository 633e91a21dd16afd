//! Channel consumer — a fixed pool of dispatch workers per channel
//!
//! Each worker owns one group subscription and settles one message at a
//! time: fetch, dispatch (including any backoff sleeps), acknowledge,
//! then fetch again. Parallelism comes from the pool size, never from
//! pipelining within a worker, so per-partition ordering survives.

use crate::config::ConsumerSettings;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::event::DomainEvent;
use crate::transport::{ChannelSubscription, ChannelTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Consumes one channel with a pool of dispatch workers
pub struct ChannelConsumer<E: DomainEvent> {
    transport: Arc<dyn ChannelTransport>,
    channel: String,
    settings: ConsumerSettings,
    dispatcher: Arc<Dispatcher<E>>,
}

impl<E: DomainEvent> ChannelConsumer<E> {
    /// Create a consumer for one channel
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        channel: impl Into<String>,
        settings: ConsumerSettings,
        dispatcher: Arc<Dispatcher<E>>,
    ) -> Self {
        Self {
            transport,
            channel: channel.into(),
            settings,
            dispatcher,
        }
    }

    /// Subscribe and spawn the worker pool
    ///
    /// Workers beyond the partition count idle until a partition frees
    /// up; they are cheap and keep the pool size independent of the
    /// transport layout.
    pub async fn start(self) -> Result<ConsumerHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(self.settings.concurrency);

        for worker in 0..self.settings.concurrency {
            let subscription = self
                .transport
                .subscribe(&self.channel, &self.settings.group)
                .await?;
            let dispatcher = Arc::clone(&self.dispatcher);
            let channel = self.channel.clone();
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(worker_loop(
                worker,
                channel,
                subscription,
                dispatcher,
                shutdown,
            )));
        }

        tracing::info!(
            channel = %self.channel,
            group = %self.settings.group,
            workers = self.settings.concurrency,
            "Consumer started"
        );
        Ok(ConsumerHandle {
            shutdown: shutdown_tx,
            tasks,
        })
    }
}

/// Running consumer pool
pub struct ConsumerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Number of worker tasks in the pool
    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop the pool and wait for workers to finish
    ///
    /// A worker mid-dispatch completes its current message (including
    /// remaining retries) before it observes the signal.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Worker task join failed");
            }
        }
    }
}

async fn worker_loop<E: DomainEvent>(
    worker: usize,
    channel: String,
    mut subscription: Box<dyn ChannelSubscription>,
    dispatcher: Arc<Dispatcher<E>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!(worker, channel = %channel, "Worker stopping");
                    return;
                }
            }
            fetched = subscription.next() => match fetched {
                Ok(Some(pending)) => {
                    match dispatcher.dispatch(pending).await {
                        Ok(outcome) => {
                            tracing::debug!(worker, channel = %channel, ?outcome, "Message settled");
                        }
                        Err(e) => {
                            tracing::error!(
                                worker,
                                channel = %channel,
                                error = %e,
                                "Dispatch failed, message left for redelivery"
                            );
                        }
                    }
                }
                Ok(None) => {
                    tracing::warn!(worker, channel = %channel, "Subscription closed, worker stopping");
                    return;
                }
                Err(e) => {
                    tracing::error!(worker, channel = %channel, error = %e, "Fetch failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
