use crate::{Publisher, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::debug;

const SEND_QUEUE_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let producer: FutureProducer = config.create()?;
        Ok(Self { producer })
    }

    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        let (partition, offset) = self.producer
            .send(record, SEND_QUEUE_TIMEOUT)
            .await
            .map_err(|(kafka_err, _)| kafka_err)?;

        debug!(topic, key, partition, offset, "Message delivered");
        Ok(())
    }
}

#[async_trait]
impl Publisher for KafkaProducer {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        self.send(topic, key, payload).await
    }

    async fn flush(&self) -> Result<()> {
        self.producer.flush(FLUSH_TIMEOUT)?;
        Ok(())
    }
}
