use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request to hold one place at `concert` for `username`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub concert: String,
}

impl Registration {
    pub fn new(username: &str, concert: &str) -> Self {
        Self {
            username: username.to_string(),
            concert: concert.to_string(),
        }
    }
}

/// Persisted form of an accepted registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub username: String,
    pub concert: String,
    pub registered_at: DateTime<Utc>,
}

impl RegistrationRecord {
    pub fn accepted(registration: &Registration) -> Self {
        Self {
            username: registration.username.clone(),
            concert: registration.concert.clone(),
            registered_at: Utc::now(),
        }
    }
}
