use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registration::Registration;

/// Request envelope published on the requests topic, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelatedRequest {
    pub id: String,
    pub value: Registration,
}

impl CorrelatedRequest {
    pub fn new(id: &str, value: Registration) -> Self {
        Self {
            id: id.to_string(),
            value,
        }
    }

    pub fn with_fresh_id(value: Registration) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            value,
        }
    }
}

/// Reply to a [`CorrelatedRequest`].
///
/// Only `value` goes into the payload, encoded as a bare JSON string; the id
/// travels as the message key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedResponse {
    pub id: String,
    pub value: String,
}

impl CorrelatedResponse {
    pub fn new(id: &str, value: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            value: value.into(),
        }
    }

    pub fn encode_value(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.value)
    }
}
