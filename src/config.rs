use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{ConcertSeed, Topics};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub ssl_ca_location: Option<String>,
    pub additional_properties: HashMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "kafka:9092".to_string(),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            ssl_ca_location: None,
            additional_properties: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Memory,
    RocksDB,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "in-memory" => Some(Self::Memory),
            "rocksdb" => Some(Self::RocksDB),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub application_id: String,
    pub state_dir: String,
    pub kafka: KafkaConfig,
    pub requests_topic: String,
    pub responses_topic: String,
    pub reply_timeout_ms: u64,
    pub processing_timeout_ms: u64,
    pub http_host: String,
    pub http_port: u16,
    pub store_backend: StoreBackend,
    pub concerts: Vec<ConcertSeed>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            application_id: "booking-service".to_string(),
            state_dir: "/tmp/concert-booking".to_string(),
            kafka: KafkaConfig::default(),
            requests_topic: Topics::REQUESTS.to_string(),
            responses_topic: Topics::RESPONSES.to_string(),
            reply_timeout_ms: 4_000,
            processing_timeout_ms: 10_000,
            http_host: "0.0.0.0".to_string(),
            http_port: 8880,
            store_backend: StoreBackend::Memory,
            concerts: Vec::new(),
        }
    }
}

impl ServiceConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }

    /// Client settings shared by producers and consumers.
    pub fn to_kafka_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config.set("bootstrap.servers", &self.kafka.bootstrap_servers);

        if let Some(security_protocol) = &self.kafka.security_protocol {
            config.set("security.protocol", security_protocol);
        }

        if let Some(sasl_mechanism) = &self.kafka.sasl_mechanism {
            config.set("sasl.mechanism", sasl_mechanism);
        }

        if let Some(sasl_username) = &self.kafka.sasl_username {
            config.set("sasl.username", sasl_username);
        }

        if let Some(sasl_password) = &self.kafka.sasl_password {
            config.set("sasl.password", sasl_password);
        }

        if let Some(ssl_ca_location) = &self.kafka.ssl_ca_location {
            config.set("ssl.ca.location", ssl_ca_location);
        }

        for (key, value) in &self.kafka.additional_properties {
            config.set(key, value);
        }

        config
    }

    /// Consumer settings for the dispatcher. All dispatcher replicas share one group.
    pub fn dispatcher_consumer_config(&self) -> rdkafka::ClientConfig {
        let mut config = self.to_kafka_config();
        config.set("group.id", format!("{}-dispatcher", self.application_id));
        config.set("auto.offset.reset", "latest");
        config
    }

    /// Consumer settings for a broker's reply listener.
    ///
    /// Every broker instance must see every reply, so each one joins its own group.
    pub fn broker_consumer_config(&self, instance_id: &str) -> rdkafka::ClientConfig {
        let mut config = self.to_kafka_config();
        config.set("group.id", format!("{}-replies-{}", self.application_id, instance_id));
        config.set("auto.offset.reset", "latest");
        config.set("enable.auto.commit", "false");
        config
    }
}
