use crate::{Result, Subscription, TransportMessage};
use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use std::time::Duration;
use tokio::time::timeout;

/// How long one poll waits before checking again.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let consumer: StreamConsumer = config.create()?;
        Ok(Self { consumer })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<()> {
        self.consumer.subscribe(topics)?;
        Ok(())
    }

    /// Create a consumer already subscribed to `topic`.
    pub fn for_topic(config: ClientConfig, topic: &str) -> Result<Self> {
        let consumer = Self::new(config)?;
        consumer.subscribe(&[topic])?;
        Ok(consumer)
    }

    pub async fn recv_message(&self, timeout_duration: Duration) -> Result<Option<TransportMessage>> {
        match timeout(timeout_duration, self.consumer.recv()).await {
            Ok(Ok(message)) => {
                let key = message.key()
                    .map(|k| String::from_utf8_lossy(k).to_string());

                let payload = message.payload()
                    .map(|p| String::from_utf8_lossy(p).to_string());

                Ok(Some(TransportMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    key,
                    payload,
                }))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None), // Timeout
        }
    }
}

#[async_trait]
impl Subscription for KafkaConsumer {
    // A Kafka subscription never closes on its own; the loops using it stop on the
    // shutdown signal instead.
    async fn next_message(&mut self) -> Result<Option<TransportMessage>> {
        loop {
            if let Some(message) = self.recv_message(POLL_INTERVAL).await? {
                return Ok(Some(message));
            }
        }
    }
}
