use concert_booking::{
    BookingService, BrokerSettings, DispatcherSettings, EventStore, EventStoreShutdown,
    KafkaConsumer, KafkaProducer, MemoryBus, MemoryEventStore, Metrics, Publisher,
    PublisherShutdown, RequestBroker, ResponseDispatcher, Result, RocksDbEventStore,
    ServiceConfig, ShutdownCoordinator, StoreBackend, Subscription, TaskShutdown,
};
use axum::extract::FromRef;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub broker: RequestBroker,
    pub booking: BookingService,
    pub metrics: Metrics,
}

impl FromRef<AppState> for Metrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Open the configured event store and seed the configured concerts.
pub async fn build_store(config: &ServiceConfig) -> Result<Arc<dyn EventStore>> {
    let store: Arc<dyn EventStore> = match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory event store");
            Arc::new(MemoryEventStore::new())
        }
        StoreBackend::RocksDB => {
            let path = Path::new(&config.state_dir).join("events");
            info!("Using RocksDB event store at {:?}", path);
            Arc::new(RocksDbEventStore::open(path)?)
        }
    };

    for seed in &config.concerts {
        if store.add_concert(seed.to_concert()).await? {
            info!(concert = %seed.name, capacity = seed.capacity, "Concert seeded");
        }
    }

    Ok(store)
}

/// Run the broker and the dispatcher over an in-process bus.
pub async fn start_in_memory(
    config: &ServiceConfig,
    store: Arc<dyn EventStore>,
    coordinator: &ShutdownCoordinator,
) -> Result<AppState> {
    let bus = MemoryBus::new();
    let requests = bus.subscribe(&config.requests_topic);
    let replies = bus.subscribe(&config.responses_topic);
    info!("Using in-memory transport");

    wire(config, store, Arc::new(bus), requests, replies, coordinator).await
}

/// Run the broker and the dispatcher against Kafka.
pub async fn start_kafka(
    config: &ServiceConfig,
    store: Arc<dyn EventStore>,
    coordinator: &ShutdownCoordinator,
) -> Result<AppState> {
    let producer = KafkaProducer::new(config.to_kafka_config())?;
    let requests = KafkaConsumer::for_topic(config.dispatcher_consumer_config(), &config.requests_topic)?;
    let instance_id = Uuid::new_v4().to_string();
    let replies = KafkaConsumer::for_topic(
        config.broker_consumer_config(&instance_id),
        &config.responses_topic,
    )?;
    info!(
        bootstrap_servers = %config.kafka.bootstrap_servers,
        instance_id = %instance_id,
        "Connected to Kafka"
    );

    wire(config, store, Arc::new(producer), requests, replies, coordinator).await
}

async fn wire<R, S>(
    config: &ServiceConfig,
    store: Arc<dyn EventStore>,
    publisher: Arc<dyn Publisher>,
    requests: R,
    replies: S,
    coordinator: &ShutdownCoordinator,
) -> Result<AppState>
where
    R: Subscription + 'static,
    S: Subscription + 'static,
{
    let metrics = Metrics::new()?;
    let booking = BookingService::new(Arc::clone(&store));

    let dispatcher = ResponseDispatcher::new(
        Arc::new(booking.clone()),
        Arc::clone(&publisher),
        DispatcherSettings::from(config),
        metrics.clone(),
    );
    let dispatcher_task = dispatcher.spawn(requests, coordinator.subscribe());

    let (broker, listener_task) = RequestBroker::start(
        Arc::clone(&publisher),
        replies,
        BrokerSettings::from(config),
        metrics.clone(),
        coordinator.subscribe(),
    );

    coordinator
        .register_component(Box::new(TaskShutdown::new("reply-listener", listener_task)))
        .await;
    coordinator
        .register_component(Box::new(TaskShutdown::new("response-dispatcher", dispatcher_task)))
        .await;
    coordinator
        .register_component(Box::new(PublisherShutdown::new(publisher)))
        .await;
    coordinator
        .register_component(Box::new(EventStoreShutdown::new(store)))
        .await;

    Ok(AppState {
        broker,
        booking,
        metrics,
    })
}
