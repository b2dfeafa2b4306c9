use crate::{BookingError, Publisher, Result, Subscription, TransportMessage};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// In-process message bus with per-topic fan-out.
///
/// Every subscriber of a topic receives every message published after it subscribed,
/// in publish order. Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<TransportMessage>>>,
    offsets: DashMap<String, AtomicI64>,
    closed: AtomicBool,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> MemorySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.inner.closed.load(Ordering::SeqCst) {
            self.inner.subscribers.entry(topic.to_string()).or_default().push(tx);
        }
        MemorySubscription { receiver: rx }
    }

    /// Drop all subscriber channels. Pending subscriptions drain and then report closed.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn next_offset(&self, topic: &str) -> i64 {
        self.inner
            .offsets
            .entry(topic.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        if self.is_closed() {
            return Err(BookingError::Transport("memory bus is closed".to_string()));
        }

        let message = TransportMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: self.next_offset(topic),
            key: Some(key.to_string()),
            payload: Some(payload.to_string()),
        };

        if let Some(mut subscribers) = self.inner.subscribers.get_mut(topic) {
            subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        } else {
            debug!(topic, "No subscribers, message dropped");
        }

        Ok(())
    }
}

pub struct MemorySubscription {
    receiver: mpsc::UnboundedReceiver<TransportMessage>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_message(&mut self) -> Result<Option<TransportMessage>> {
        Ok(self.receiver.recv().await)
    }
}
