//! Request/response over the publish/subscribe transport.
//!
//! A call registers a delivery slot, publishes its request keyed by the
//! correlation id and waits for the reply listener to hand over the matching
//! message from the responses topic.

pub mod pending;

pub use pending::*;

use crate::{
    BookingError, CorrelatedRequest, Metrics, Publisher, Registration, Result, ServiceConfig,
    Subscription, TransportMessage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub requests_topic: String,
    pub responses_topic: String,
    pub reply_timeout: Duration,
}

impl From<&ServiceConfig> for BrokerSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            requests_topic: config.requests_topic.clone(),
            responses_topic: config.responses_topic.clone(),
            reply_timeout: config.reply_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct RequestBroker {
    publisher: Arc<dyn Publisher>,
    pending: Arc<PendingCalls>,
    settings: BrokerSettings,
    metrics: Metrics,
}

impl RequestBroker {
    pub fn new(publisher: Arc<dyn Publisher>, settings: BrokerSettings, metrics: Metrics) -> Self {
        Self {
            publisher,
            pending: Arc::new(PendingCalls::new()),
            settings,
            metrics,
        }
    }

    /// Create a broker and spawn its reply listener on `replies`.
    ///
    /// The listener runs until `shutdown` fires or the subscription closes.
    pub fn start<S>(
        publisher: Arc<dyn Publisher>,
        replies: S,
        settings: BrokerSettings,
        metrics: Metrics,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<()>)
    where
        S: Subscription + 'static,
    {
        let broker = Self::new(publisher, settings, metrics);
        let listener = tokio::spawn(deliver_replies(
            replies,
            Arc::clone(&broker.pending),
            broker.metrics.clone(),
            shutdown,
        ));
        (broker, listener)
    }

    pub fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    /// Book a place for `registration` under a fresh correlation id.
    pub async fn book(&self, registration: Registration) -> Result<String> {
        let request = CorrelatedRequest::with_fresh_id(registration);
        self.send(&request).await
    }

    /// Publish `request` and wait for the reply string carrying the same id.
    pub async fn send(&self, request: &CorrelatedRequest) -> Result<String> {
        let payload = serde_json::to_string(request).map_err(|e| {
            self.metrics.broker_errors.inc();
            BookingError::from(e)
        })?;

        // Register before publishing so a fast reply cannot arrive ahead of its slot.
        let PendingSlot { token, receiver } = self.pending.register(&request.id)?;
        self.metrics.pending_call_opened();
        let _slot = SlotGuard {
            pending: &self.pending,
            metrics: &self.metrics,
            id: &request.id,
            token,
        };

        let started = Instant::now();
        if let Err(e) = self
            .publisher
            .publish(&self.settings.requests_topic, &request.id, &payload)
            .await
        {
            self.metrics.broker_errors.inc();
            error!(correlation_id = %request.id, "Failed to publish request: {}", e);
            return Err(e);
        }
        self.metrics.broker_requests_sent.inc();
        debug!(correlation_id = %request.id, "Request published, waiting for reply");

        let message = match timeout(self.settings.reply_timeout, receiver).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => return Err(BookingError::BrokerClosed),
            Err(_) => {
                self.metrics.broker_timeouts.inc();
                warn!(
                    correlation_id = %request.id,
                    timeout_ms = self.settings.reply_timeout.as_millis() as u64,
                    "Timeout waiting for response"
                );
                return Err(BookingError::ReplyTimeout {
                    correlation_id: request.id.clone(),
                    timeout: self.settings.reply_timeout,
                });
            }
        };

        self.metrics.record_round_trip(started.elapsed());
        decode_reply(&request.id, &message).map_err(|e| {
            self.metrics.broker_errors.inc();
            e
        })
    }
}

/// Releases the slot of a call on every exit path, including the call future being dropped.
struct SlotGuard<'a> {
    pending: &'a PendingCalls,
    metrics: &'a Metrics,
    id: &'a str,
    token: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.pending.release(self.id, self.token) {
            self.metrics.pending_calls_closed(1);
        }
    }
}

fn decode_reply(correlation_id: &str, message: &TransportMessage) -> Result<String> {
    let payload = message.payload.as_deref().ok_or_else(|| BookingError::ReplyDecode {
        correlation_id: correlation_id.to_string(),
        reason: "empty payload".to_string(),
    })?;

    serde_json::from_str::<String>(payload).map_err(|e| BookingError::ReplyDecode {
        correlation_id: correlation_id.to_string(),
        reason: e.to_string(),
    })
}

/// Reply listener: routes each message on the responses topic to the call waiting on its key.
pub async fn deliver_replies<S>(
    mut replies: S,
    pending: Arc<PendingCalls>,
    metrics: Metrics,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: Subscription,
{
    info!("Reply listener started");

    loop {
        let next = tokio::select! {
            _ = shutdown.recv() => {
                info!("Reply listener received shutdown signal");
                break;
            }
            next = replies.next_message() => next,
        };

        match next {
            Ok(Some(message)) => route_reply(&pending, &metrics, message),
            Ok(None) => {
                info!("Reply channel closed, exiting reply listener");
                break;
            }
            Err(e) => error!("Error receiving reply: {}", e),
        }
    }

    let abandoned = pending.close_all();
    if abandoned > 0 {
        warn!(abandoned, "Reply listener stopped with calls still waiting");
    }
    metrics.pending_calls_closed(abandoned);
}

fn route_reply(pending: &PendingCalls, metrics: &Metrics, message: TransportMessage) {
    let Some(id) = message.key.clone() else {
        metrics.broker_replies_dropped.inc();
        warn!(offset = message.offset, "Reply without correlation key dropped");
        return;
    };

    match pending.deliver(&id, message) {
        Delivery::Delivered { waited } => {
            metrics.pending_calls_closed(1);
            debug!(correlation_id = %id, waited_ms = waited.as_millis() as u64, "Reply delivered");
        }
        Delivery::CallerGone => {
            metrics.pending_calls_closed(1);
            metrics.broker_replies_dropped.inc();
            debug!(correlation_id = %id, "Caller went away, reply dropped");
        }
        Delivery::NoWaiter => {
            metrics.broker_replies_dropped.inc();
            debug!(correlation_id = %id, "No caller waiting, reply dropped");
        }
    }
}
