use crate::{BookingError, EventStore, Publisher, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn, error};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    started: Arc<AtomicBool>,
    shutdown_timeout: Duration,
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shutdown_tx,
            components: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(AtomicBool::new(false)),
            shutdown_timeout,
        }
    }

    /// Register a component for graceful shutdown
    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        let mut components = self.components.lock().await;
        info!("Registering component '{}' for graceful shutdown", component.name());
        components.push(component);
    }

    /// Get a shutdown signal receiver
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Signal every subscriber, then shut registered components down in
    /// registration order. Only the first call does any work.
    pub async fn shutdown(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Initiating graceful shutdown...");

        if self.shutdown_tx.send(()).is_err() {
            warn!("No task was listening for the shutdown signal");
        }

        let components = self.components.lock().await;
        let shutdown_all = async {
            for component in components.iter() {
                info!("Shutting down component '{}'", component.name());
                match component.shutdown().await {
                    Ok(()) => info!("Component '{}' shutdown successfully", component.name()),
                    Err(e) => error!("Component '{}' shutdown failed: {}", component.name(), e),
                }
            }
        };

        match tokio::time::timeout(self.shutdown_timeout, shutdown_all).await {
            Ok(()) => {
                info!("All components shutdown successfully");
                Ok(())
            }
            Err(_) => {
                error!("Shutdown timeout exceeded");
                Err(BookingError::InvalidArgument(
                    "Shutdown timeout exceeded".to_string()
                ))
            }
        }
    }
}

/// Waits for a background loop to finish after the shutdown signal.
pub struct TaskShutdown {
    name: String,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskShutdown {
    pub fn new(name: &str, handle: JoinHandle<()>) -> Self {
        Self {
            name: name.to_string(),
            handle: Mutex::new(Some(handle)),
        }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for TaskShutdown {
    async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.handle.lock().await.take() {
            handle
                .await
                .map_err(|e| BookingError::InvalidArgument(format!("Task '{}' failed: {}", self.name, e)))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Flushes a publisher's outgoing buffer
pub struct PublisherShutdown {
    publisher: Arc<dyn Publisher>,
}

impl PublisherShutdown {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for PublisherShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing publisher...");
        self.publisher.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "publisher"
    }
}

/// Flushes the event store to disk
pub struct EventStoreShutdown {
    store: Arc<dyn EventStore>,
}

impl EventStoreShutdown {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for EventStoreShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing event store...");
        self.store.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "event-store"
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
                }
            }
            Err(e) => {
                warn!("Failed to setup SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }
}
