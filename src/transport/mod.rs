//! Publish/subscribe seam between the broker, the dispatcher and the message bus.

pub mod memory_bus;

pub use memory_bus::*;

use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Publishes keyed payloads to named topics.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()>;

    /// Push buffered messages out. No-op for transports without buffering.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A stream of messages from one subscribed topic.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message. `Ok(None)` means the transport was closed.
    async fn next_message(&mut self) -> Result<Option<TransportMessage>>;
}

#[async_trait]
impl<S> Subscription for Box<S>
where
    S: Subscription + ?Sized,
{
    async fn next_message(&mut self) -> Result<Option<TransportMessage>> {
        (**self).next_message().await
    }
}

#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<String>,
}

impl TransportMessage {
    pub fn deserialize_value<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match &self.payload {
            Some(payload) => {
                let value = serde_json::from_str(payload)?;
                Ok(value)
            }
            None => Err(crate::BookingError::InvalidArgument("Empty message payload".to_string())),
        }
    }
}
