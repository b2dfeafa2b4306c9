use concert_booking::*;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_config_parsing_integration() {
    let config_content = r#"
bootstrap.servers=localhost:9092,localhost:9093
security.protocol=PLAINTEXT
requests.topic=booking.requests
responses.topic=booking.responses
reply.timeout.ms=2500
processing.timeout.ms=8000
http.port=9000
store.backend=rocksdb
state.dir=/var/lib/booking
concerts=jazz:100, rock:2
linger.ms=5
"#;

    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("test.properties");
    std::fs::write(&config_path, config_content).unwrap();

    let config = parse_properties_file(&config_path, "test-service").unwrap();

    assert_eq!(config.application_id, "test-service");
    assert_eq!(config.kafka.bootstrap_servers, "localhost:9092,localhost:9093");
    assert_eq!(config.kafka.security_protocol, Some("PLAINTEXT".to_string()));
    assert_eq!(config.requests_topic, "booking.requests");
    assert_eq!(config.responses_topic, "booking.responses");
    assert_eq!(config.reply_timeout(), std::time::Duration::from_millis(2500));
    assert_eq!(config.processing_timeout(), std::time::Duration::from_secs(8));
    assert_eq!(config.http_port, 9000);
    assert_eq!(config.store_backend, StoreBackend::RocksDB);
    assert_eq!(config.state_dir, "/var/lib/booking");
    assert_eq!(
        config.concerts,
        vec![
            ConcertSeed { name: "jazz".to_string(), capacity: 100 },
            ConcertSeed { name: "rock".to_string(), capacity: 2 },
        ]
    );
    assert_eq!(config.kafka.additional_properties.get("linger.ms"), Some(&"5".to_string()));

    let extra_path = temp_dir.path().join("extra.properties");
    std::fs::write(&extra_path, "reply.timeout.ms=100\nacks=all\n").unwrap();

    let merged = merge_properties(config, &extra_path).unwrap();
    assert_eq!(merged.reply_timeout_ms, 100);
    assert_eq!(merged.kafka.additional_properties.get("acks"), Some(&"all".to_string()));
}

#[tokio::test]
async fn test_config_defaults_match_reference_deadlines() {
    let config = ServiceConfig::default();

    assert_eq!(config.reply_timeout_ms, 4_000);
    assert_eq!(config.processing_timeout_ms, 10_000);
    assert_eq!(config.requests_topic, Topics::REQUESTS);
    assert_eq!(config.responses_topic, Topics::RESPONSES);
    assert_eq!(config.store_backend, StoreBackend::Memory);
}

#[tokio::test]
async fn test_invalid_config_values_are_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.properties");
    std::fs::write(&config_path, "reply.timeout.ms=soon\n").unwrap();

    let err = parse_properties_file(&config_path, "test-service").unwrap_err();
    assert!(matches!(err, BookingError::InvalidArgument(_)));

    assert!(parse_concert_list("jazz").is_err());
    assert!(parse_concert_list(":10").is_err());
    assert!(parse_concert_list("jazz:many").is_err());
    assert!(parse_concert_list("").unwrap().is_empty());
}

#[tokio::test]
async fn test_overrides_take_precedence() {
    let source = ::config::Config::builder()
        .set_override("bootstrap_servers", "broker:29092")
        .unwrap()
        .set_override("reply_timeout_ms", 750)
        .unwrap()
        .set_override("store_backend", "rocksdb")
        .unwrap()
        .set_override("concerts", "opera:3")
        .unwrap()
        .build()
        .unwrap();

    let config = apply_overrides(ServiceConfig::default(), &source).unwrap();

    assert_eq!(config.kafka.bootstrap_servers, "broker:29092");
    assert_eq!(config.reply_timeout_ms, 750);
    assert_eq!(config.processing_timeout_ms, 10_000);
    assert_eq!(config.store_backend, StoreBackend::RocksDB);
    assert_eq!(config.concerts[0].name, "opera");

    let negative = ::config::Config::builder()
        .set_override("reply_timeout_ms", -1)
        .unwrap()
        .build()
        .unwrap();
    assert!(apply_overrides(ServiceConfig::default(), &negative).is_err());

    let malformed = ::config::Config::builder()
        .set_override("reply_timeout_ms", "4s")
        .unwrap()
        .build()
        .unwrap();
    let err = apply_overrides(ServiceConfig::default(), &malformed).unwrap_err();
    assert!(matches!(err, BookingError::Config(_)));

    let bad_port = ::config::Config::builder()
        .set_override("http_port", "eighty")
        .unwrap()
        .build()
        .unwrap();
    let err = apply_overrides(ServiceConfig::default(), &bad_port).unwrap_err();
    assert!(matches!(err, BookingError::Config(_)));

    let empty = ::config::Config::builder().build().unwrap();
    let untouched = apply_overrides(ServiceConfig::default(), &empty).unwrap();
    assert_eq!(untouched.reply_timeout_ms, 4_000);
    assert_eq!(untouched.http_port, 8880);
}

#[tokio::test]
async fn test_wire_format() {
    let request = CorrelatedRequest::new("3f1c", Registration::new("alice", "jazz"));
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "id": "3f1c", "value": { "username": "alice", "concert": "jazz" } })
    );

    let response = CorrelatedResponse::new("3f1c", PLACE_RESERVED);
    assert_eq!(response.encode_value().unwrap(), "\"Place reserved\"");

    let fresh = CorrelatedRequest::with_fresh_id(Registration::new("bob", "jazz"));
    let other = CorrelatedRequest::with_fresh_id(Registration::new("bob", "jazz"));
    assert_ne!(fresh.id, other.id);
}

#[tokio::test]
async fn test_rocksdb_event_store_integration() {
    let temp_dir = tempdir().unwrap();
    let store = RocksDbEventStore::open(temp_dir.path().join("events")).unwrap();

    assert!(store.add_concert(Concert::new("jazz", 2)).await.unwrap());
    assert!(store.add_concert(Concert::new("rock", 5)).await.unwrap());
    assert!(!store.add_concert(Concert::new("jazz", 50)).await.unwrap());

    let alice = Registration::new("alice", "jazz");
    store.append_registration(&alice).await.unwrap();
    assert!(store.registration_exists(&alice).await.unwrap());

    let err = store.append_registration(&alice).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRegistration { .. }));

    store.append_registration(&Registration::new("bob", "jazz")).await.unwrap();
    let err = store
        .append_registration(&Registration::new("carol", "jazz"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CapacityExhausted(_)));

    let err = store
        .append_registration(&Registration::new("carol", "opera"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownConcert(_)));

    let jazz = store.get_concert("jazz").await.unwrap().unwrap();
    assert_eq!(jazz.capacity, 2);
    assert_eq!(jazz.occupied, 2);
    assert!(jazz.sold_out);

    let names: Vec<String> = store
        .list_concerts()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["jazz".to_string(), "rock".to_string()]);

    let record: RegistrationRecord = store
        .kv()
        .get(&registration_key("jazz", "alice"))
        .unwrap()
        .unwrap();
    assert_eq!(record.username, "alice");
    assert_eq!(record.concert, "jazz");
}

#[tokio::test]
async fn test_rocksdb_event_store_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("events");

    {
        let store = RocksDbEventStore::open(&path).unwrap();
        store.add_concert(Concert::new("jazz", 3)).await.unwrap();
        store.append_registration(&Registration::new("alice", "jazz")).await.unwrap();
        store.flush().await.unwrap();
    }

    let store = RocksDbEventStore::open(&path).unwrap();
    let jazz = store.get_concert("jazz").await.unwrap().unwrap();
    assert_eq!(jazz.occupied, 1);
    assert!(store
        .registration_exists(&Registration::new("alice", "jazz"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_registration_keys_do_not_collide() {
    assert_ne!(registration_key("a#b", "c"), registration_key("a", "b#c"));
    assert_eq!(concert_key("jazz"), "concert:jazz");
}

#[tokio::test]
async fn test_booking_service_over_rocksdb() {
    let temp_dir = tempdir().unwrap();
    let store = RocksDbEventStore::open(temp_dir.path().join("events")).unwrap();
    store.add_concert(Concert::new("jazz", 1)).await.unwrap();
    let service = BookingService::new(Arc::new(store));

    service.register(&Registration::new("alice", "jazz")).await.unwrap();
    let err = service
        .register(&Registration::new("bob", "jazz"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::SoldOut));
    assert_eq!(err.to_string(), SOLD_OUT);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rocksdb_concurrent_registrations_never_overbook() {
    let temp_dir = tempdir().unwrap();
    let store = RocksDbEventStore::open(temp_dir.path().join("events")).unwrap();
    store.add_concert(Concert::new("jazz", 15)).await.unwrap();
    let service = BookingService::new(Arc::new(store.clone()));

    // 300 calls from 60 distinct users, five attempts each.
    let handles: Vec<_> = (0..300)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let username = format!("user-{}", i % 60);
                let result = service.register(&Registration::new(&username, "jazz")).await;
                (username, result)
            })
        })
        .collect();

    let mut accepted = Vec::new();
    for handle in handles {
        let (username, result) = handle.await.unwrap();
        match result {
            Ok(()) => accepted.push(username),
            Err(RegistrationError::SoldOut) | Err(RegistrationError::AlreadyRegistered) => {}
            Err(e) => panic!("unexpected error {}", e),
        }
    }

    assert_eq!(accepted.len(), 15);
    let mut unique = accepted.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 15);

    let jazz = store.get_concert("jazz").await.unwrap().unwrap();
    assert_eq!(jazz.occupied, jazz.capacity);
    assert!(jazz.sold_out);

    let records: Vec<RegistrationRecord> = store
        .kv()
        .scan_prefix(Stores::REGISTRATION_PREFIX)
        .unwrap();
    let mut stored: Vec<String> = records.into_iter().map(|r| r.username).collect();
    stored.sort();
    assert_eq!(stored, unique);
}
