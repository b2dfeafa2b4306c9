use crate::{
    CorrelatedRequest, CorrelatedResponse, Metrics, Publisher, Registrar, RegistrationError,
    ServiceConfig, Subscription, TransportMessage, PLACE_RESERVED,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub responses_topic: String,
    pub processing_timeout: Duration,
}

impl From<&ServiceConfig> for DispatcherSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            responses_topic: config.responses_topic.clone(),
            processing_timeout: config.processing_timeout(),
        }
    }
}

/// Consumes booking requests, runs them through a [`Registrar`] and publishes
/// the outcome string back under the request's correlation id.
#[derive(Clone)]
pub struct ResponseDispatcher {
    registrar: Arc<dyn Registrar>,
    publisher: Arc<dyn Publisher>,
    settings: DispatcherSettings,
    metrics: Metrics,
}

impl ResponseDispatcher {
    pub fn new(
        registrar: Arc<dyn Registrar>,
        publisher: Arc<dyn Publisher>,
        settings: DispatcherSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            registrar,
            publisher,
            settings,
            metrics,
        }
    }

    pub fn spawn<S>(self, requests: S, shutdown: broadcast::Receiver<()>) -> JoinHandle<()>
    where
        S: Subscription + 'static,
    {
        tokio::spawn(async move { self.run(requests, shutdown).await })
    }

    pub async fn run<S>(&self, mut requests: S, mut shutdown: broadcast::Receiver<()>)
    where
        S: Subscription,
    {
        info!("Response dispatcher is running...");

        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Response dispatcher received shutdown signal");
                    break;
                }
                next = requests.next_message() => next,
            };

            match next {
                Ok(Some(message)) => {
                    self.handle_message(&message).await;
                }
                Ok(None) => {
                    info!("Request channel closed, exiting dispatcher");
                    break;
                }
                Err(e) => error!("Error receiving request: {}", e),
            }
        }

        info!("Response dispatcher shutting down...");
    }

    /// Process one request message. Returns the reply that was produced, or
    /// `None` when the message could not be decoded and no reply was sent.
    pub async fn handle_message(&self, message: &TransportMessage) -> Option<CorrelatedResponse> {
        let request: CorrelatedRequest = match message.deserialize_value() {
            Ok(request) => request,
            Err(e) => {
                self.metrics.dispatcher_decode_failures.inc();
                warn!(
                    partition = message.partition,
                    offset = message.offset,
                    "Error decoding request, skipping: {}", e
                );
                return None;
            }
        };

        info!(
            correlation_id = %request.id,
            concert = %request.value.concert,
            username = %request.value.username,
            "Received booking request"
        );

        let response = CorrelatedResponse::new(&request.id, self.process(&request).await);

        let payload = match response.encode_value() {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics.dispatcher_publish_failures.inc();
                error!(correlation_id = %response.id, "Failed to encode response: {}", e);
                return Some(response);
            }
        };

        if let Err(e) = self
            .publisher
            .publish(&self.settings.responses_topic, &response.id, &payload)
            .await
        {
            self.metrics.dispatcher_publish_failures.inc();
            error!(correlation_id = %response.id, "Failed to publish response: {}", e);
        }

        Some(response)
    }

    async fn process(&self, request: &CorrelatedRequest) -> String {
        let outcome = timeout(
            self.settings.processing_timeout,
            self.registrar.register(&request.value),
        )
        .await
        .unwrap_or(Err(RegistrationError::DeadlineExceeded));

        match outcome {
            Ok(()) => {
                self.metrics.record_registration(true);
                PLACE_RESERVED.to_string()
            }
            Err(e) => {
                self.metrics.record_registration(false);
                if let RegistrationError::DeadlineExceeded = e {
                    warn!(correlation_id = %request.id, "Registration exceeded processing deadline");
                }
                e.to_string()
            }
        }
    }
}
