use crate::{
    Concert, EventStore, Registration, StoreError, ALREADY_REGISTERED, NO_SUCH_CONCERT,
    PROCESSING_DEADLINE_EXCEEDED, SOLD_OUT,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Outcome of a rejected registration.
///
/// The `Display` text of each variant is what the dispatcher sends back over
/// the transport, so the messages must stay in sync with `domain::outcome`.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("{}", NO_SUCH_CONCERT)]
    NoSuchEvent,

    #[error("{}", SOLD_OUT)]
    SoldOut,

    #[error("{}", ALREADY_REGISTERED)]
    AlreadyRegistered,

    #[error("{}", PROCESSING_DEADLINE_EXCEEDED)]
    DeadlineExceeded,

    #[error("service add record error: {0}")]
    Persistence(#[source] StoreError),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateRegistration { .. } => Self::AlreadyRegistered,
            StoreError::CapacityExhausted(_) => Self::SoldOut,
            StoreError::UnknownConcert(_) => Self::NoSuchEvent,
            other => Self::Persistence(other),
        }
    }
}

/// Anything able to accept or reject a registration. The dispatcher only
/// depends on this.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<(), RegistrationError>;
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn EventStore>,
}

impl BookingService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, registration: &Registration) -> Result<(), RegistrationError> {
        let concert = self
            .store
            .get_concert(&registration.concert)
            .await
            .map_err(RegistrationError::Persistence)?
            .ok_or(RegistrationError::NoSuchEvent)?;

        if concert.is_sold_out() {
            return Err(RegistrationError::SoldOut);
        }

        let exists = self
            .store
            .registration_exists(registration)
            .await
            .map_err(RegistrationError::Persistence)?;
        if exists {
            return Err(RegistrationError::AlreadyRegistered);
        }

        // The store re-checks both conditions atomically; a conflict found there
        // maps back to the same domain error.
        if let Err(err) = self.store.append_registration(registration).await {
            warn!(
                concert = %registration.concert,
                username = %registration.username,
                "Append rejected: {}", err
            );
            return Err(err.into());
        }

        info!(
            concert = %registration.concert,
            username = %registration.username,
            "Place reserved"
        );
        Ok(())
    }

    pub async fn list_events(&self) -> Result<Vec<Concert>, RegistrationError> {
        self.store
            .list_concerts()
            .await
            .map_err(RegistrationError::Persistence)
    }
}

#[async_trait]
impl Registrar for BookingService {
    async fn register(&self, registration: &Registration) -> Result<(), RegistrationError> {
        BookingService::register(self, registration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryEventStore, StoreResult};

    fn service(concerts: Vec<Concert>) -> (BookingService, Arc<MemoryEventStore>) {
        let store = Arc::new(MemoryEventStore::with_concerts(concerts));
        (BookingService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn reserves_until_capacity_is_reached() {
        let (service, store) = service(vec![Concert::new("jazz", 2)]);

        service.register(&Registration::new("alice", "jazz")).await.unwrap();
        service.register(&Registration::new("bob", "jazz")).await.unwrap();
        let err = service
            .register(&Registration::new("carol", "jazz"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::SoldOut));
        assert_eq!(store.attendees("jazz"), vec!["alice", "bob"]);
        let jazz = store.get_concert("jazz").await.unwrap().unwrap();
        assert_eq!(jazz.occupied, 2);
        assert!(jazz.sold_out);
    }

    #[tokio::test]
    async fn rejects_unknown_concert_and_duplicates() {
        let (service, store) = service(vec![Concert::new("jazz", 5)]);

        let err = service
            .register(&Registration::new("alice", "rock"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NoSuchEvent));
        assert_eq!(err.to_string(), NO_SUCH_CONCERT);

        service.register(&Registration::new("alice", "jazz")).await.unwrap();
        let err = service
            .register(&Registration::new("alice", "jazz"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::AlreadyRegistered));
        assert_eq!(err.to_string(), ALREADY_REGISTERED);
        assert_eq!(store.get_concert("jazz").await.unwrap().unwrap().occupied, 1);
    }

    #[tokio::test]
    async fn zero_capacity_concert_is_sold_out_from_the_start() {
        let (service, _) = service(vec![Concert::new("empty", 0)]);

        let err = service
            .register(&Registration::new("alice", "empty"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::SoldOut));
    }

    #[tokio::test]
    async fn sold_out_is_reported_before_duplicate() {
        let (service, _) = service(vec![Concert::new("jazz", 1)]);
        service.register(&Registration::new("alice", "jazz")).await.unwrap();

        let err = service
            .register(&Registration::new("alice", "jazz"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::SoldOut));
    }

    struct BrokenStore;

    #[async_trait]
    impl EventStore for BrokenStore {
        async fn get_concert(&self, _name: &str) -> StoreResult<Option<Concert>> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk unavailable",
            )))
        }

        async fn list_concerts(&self) -> StoreResult<Vec<Concert>> {
            Ok(Vec::new())
        }

        async fn registration_exists(&self, _registration: &Registration) -> StoreResult<bool> {
            Ok(false)
        }

        async fn append_registration(&self, _registration: &Registration) -> StoreResult<()> {
            Ok(())
        }

        async fn add_concert(&self, _concert: Concert) -> StoreResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn store_failure_is_not_reported_as_unknown_concert() {
        let service = BookingService::new(Arc::new(BrokenStore));

        let err = service
            .register(&Registration::new("alice", "jazz"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Persistence(_)));
        assert!(err.to_string().starts_with("service add record error: "));
    }

    #[test]
    fn store_conflicts_map_to_domain_errors() {
        let duplicate = StoreError::DuplicateRegistration {
            username: "alice".to_string(),
            concert: "jazz".to_string(),
        };
        assert!(matches!(
            RegistrationError::from(duplicate),
            RegistrationError::AlreadyRegistered
        ));
        assert!(matches!(
            RegistrationError::from(StoreError::CapacityExhausted("jazz".to_string())),
            RegistrationError::SoldOut
        ));
        assert!(matches!(
            RegistrationError::from(StoreError::UnknownConcert("jazz".to_string())),
            RegistrationError::NoSuchEvent
        ));
    }
}
