use crate::{
    concert_key, registration_key, Concert, EventStore, Registration, RegistrationRecord,
    StoreError, StoreResult, Stores,
};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// RocksDB-based key/value store holding JSON values
pub struct RocksDBStore {
    db: DB,
}

impl RocksDBStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(10000);
        opts.set_use_fsync(false);
        opts.set_bytes_per_sync(8388608);
        opts.optimize_for_point_lookup(64);
        opts.set_table_cache_num_shard_bits(6);

        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    pub fn get<T>(&self, key: &str) -> StoreResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.db.get(key)? {
            Some(value) => {
                let deserialized: T = serde_json::from_slice(&value)?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    pub fn put<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize,
    {
        let serialized = serde_json::to_vec(value)?;
        self.db.put(key, serialized)?;
        Ok(())
    }

    /// Write several JSON values in one atomic batch.
    pub fn put_batch(&self, entries: &[(String, Vec<u8>)]) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for (key, value) in entries {
            batch.put(key, value);
        }
        self.db.write(batch)?;
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.db.get(key)?.is_some())
    }

    /// All values whose key starts with `prefix`, in key order.
    pub fn scan_prefix<T>(&self, prefix: &str) -> StoreResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut values = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for RocksDBStore {
    fn drop(&mut self) {
        let _ = self.db.flush();
    }
}

/// Event store persisted in RocksDB.
///
/// Concerts are stored under `concert:<name>` and registrations under
/// `registration:<len>:<concert>#<username>`. Writers are serialized and every
/// registration is committed together with the updated concert in a single batch.
#[derive(Clone)]
pub struct RocksDbEventStore {
    kv: Arc<RocksDBStore>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbEventStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        let kv = RocksDBStore::new(path)?;
        Ok(Self {
            kv: Arc::new(kv),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn kv(&self) -> Arc<RocksDBStore> {
        Arc::clone(&self.kv)
    }
}

#[async_trait]
impl EventStore for RocksDbEventStore {
    async fn get_concert(&self, name: &str) -> StoreResult<Option<Concert>> {
        self.kv.get(&concert_key(name))
    }

    async fn list_concerts(&self) -> StoreResult<Vec<Concert>> {
        self.kv.scan_prefix(Stores::CONCERT_PREFIX)
    }

    async fn registration_exists(&self, registration: &Registration) -> StoreResult<bool> {
        self.kv
            .contains_key(&registration_key(&registration.concert, &registration.username))
    }

    async fn append_registration(&self, registration: &Registration) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let concert_key = concert_key(&registration.concert);
        let mut concert: Concert = self
            .kv
            .get(&concert_key)?
            .ok_or_else(|| StoreError::UnknownConcert(registration.concert.clone()))?;

        let record_key = registration_key(&registration.concert, &registration.username);
        if self.kv.contains_key(&record_key)? {
            return Err(StoreError::DuplicateRegistration {
                username: registration.username.clone(),
                concert: registration.concert.clone(),
            });
        }

        if !concert.occupy_place() {
            return Err(StoreError::CapacityExhausted(registration.concert.clone()));
        }

        let record = RegistrationRecord::accepted(registration);
        self.kv.put_batch(&[
            (concert_key, serde_json::to_vec(&concert)?),
            (record_key, serde_json::to_vec(&record)?),
        ])?;

        debug!(
            concert = %registration.concert,
            username = %registration.username,
            occupied = concert.occupied,
            "Registration persisted"
        );
        Ok(())
    }

    async fn add_concert(&self, concert: Concert) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let key = concert_key(&concert.name);
        if self.kv.contains_key(&key)? {
            warn!(concert = %concert.name, "Concert already stored, keeping existing state");
            return Ok(false);
        }
        self.kv.put(&key, &concert)?;
        Ok(true)
    }

    async fn flush(&self) -> StoreResult<()> {
        self.kv.flush()
    }
}
