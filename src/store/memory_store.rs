use crate::{Concert, EventStore, Registration, StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct ConcertEntry {
    concert: Concert,
    attendees: HashSet<String>,
}

/// In-memory event store.
///
/// Each concert lives in one map entry together with its attendee set, so the
/// entry's shard lock makes check-and-append atomic per concert.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    concerts: Arc<DashMap<String, ConcertEntry>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concerts<I>(concerts: I) -> Self
    where
        I: IntoIterator<Item = Concert>,
    {
        let store = Self::new();
        for concert in concerts {
            store.concerts.insert(
                concert.name.clone(),
                ConcertEntry {
                    concert,
                    attendees: HashSet::new(),
                },
            );
        }
        store
    }

    pub fn attendees(&self, concert: &str) -> Vec<String> {
        let mut attendees: Vec<String> = self
            .concerts
            .get(concert)
            .map(|entry| entry.attendees.iter().cloned().collect())
            .unwrap_or_default();
        attendees.sort();
        attendees
    }

    pub fn len(&self) -> usize {
        self.concerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concerts.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn get_concert(&self, name: &str) -> StoreResult<Option<Concert>> {
        Ok(self.concerts.get(name).map(|entry| entry.concert.clone()))
    }

    async fn list_concerts(&self) -> StoreResult<Vec<Concert>> {
        let mut concerts: Vec<Concert> = self
            .concerts
            .iter()
            .map(|entry| entry.value().concert.clone())
            .collect();
        concerts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(concerts)
    }

    async fn registration_exists(&self, registration: &Registration) -> StoreResult<bool> {
        Ok(self
            .concerts
            .get(&registration.concert)
            .map(|entry| entry.attendees.contains(&registration.username))
            .unwrap_or(false))
    }

    async fn append_registration(&self, registration: &Registration) -> StoreResult<()> {
        let mut entry = self
            .concerts
            .get_mut(&registration.concert)
            .ok_or_else(|| StoreError::UnknownConcert(registration.concert.clone()))?;

        if entry.attendees.contains(&registration.username) {
            return Err(StoreError::DuplicateRegistration {
                username: registration.username.clone(),
                concert: registration.concert.clone(),
            });
        }

        if !entry.concert.occupy_place() {
            return Err(StoreError::CapacityExhausted(registration.concert.clone()));
        }
        entry.attendees.insert(registration.username.clone());

        Ok(())
    }

    async fn add_concert(&self, concert: Concert) -> StoreResult<bool> {
        match self.concerts.entry(concert.name.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(ConcertEntry {
                    concert,
                    attendees: HashSet::new(),
                });
                Ok(true)
            }
        }
    }
}
