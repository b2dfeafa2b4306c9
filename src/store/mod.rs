//! Durable record of concerts and the registrations made for them.

pub mod memory_store;
pub mod rocksdb_store;

pub use memory_store::*;
pub use rocksdb_store::*;

use crate::{Concert, Registration};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user {username} is already registered for {concert}")]
    DuplicateRegistration { username: String, concert: String },

    #[error("concert {0} has no free places")]
    CapacityExhausted(String),

    #[error("concert {0} not found")]
    UnknownConcert(String),

    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("Corrupt record: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage seen by the booking service.
///
/// `append_registration` must check for a duplicate registration and a free
/// place and then record the registration as one atomic step; the booking
/// service takes no locks of its own.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_concert(&self, name: &str) -> StoreResult<Option<Concert>>;

    async fn list_concerts(&self) -> StoreResult<Vec<Concert>>;

    async fn registration_exists(&self, registration: &Registration) -> StoreResult<bool>;

    async fn append_registration(&self, registration: &Registration) -> StoreResult<()>;

    /// Insert a concert unless one with the same name exists. Returns whether it was inserted.
    async fn add_concert(&self, concert: Concert) -> StoreResult<bool>;

    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}
