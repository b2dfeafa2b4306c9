use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("timeout waiting for response to {correlation_id} after {timeout:?}")]
    ReplyTimeout {
        correlation_id: String,
        timeout: Duration,
    },

    #[error("error decoding response to {correlation_id}: {reason}")]
    ReplyDecode {
        correlation_id: String,
        reason: String,
    },

    #[error("correlation id {0} is already waiting for a response")]
    DuplicateCorrelationId(String),

    #[error("request broker is shut down")]
    BrokerClosed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl BookingError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReplyTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
