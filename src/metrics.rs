use prometheus::{
    Counter, Histogram, Gauge, Registry, Opts, HistogramOpts,
    register_counter_with_registry, register_histogram_with_registry,
    register_gauge_with_registry, Encoder, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use crate::{BookingError, Result};

/// Metrics collector for the booking bridge
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Request broker metrics
    pub broker_requests_sent: Counter,
    pub broker_replies_received: Counter,
    pub broker_replies_dropped: Counter,
    pub broker_timeouts: Counter,
    pub broker_errors: Counter,
    pub broker_round_trip: Histogram,
    pub pending_calls: Gauge,

    // Response dispatcher metrics
    pub dispatcher_requests_processed: Counter,
    pub dispatcher_decode_failures: Counter,
    pub dispatcher_publish_failures: Counter,

    // Business metrics
    pub registrations_accepted: Counter,
    pub registrations_rejected: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let broker_requests_sent = register_counter_with_registry!(
            Opts::new("broker_requests_sent_total", "Requests published by the request broker"),
            registry
        )?;

        let broker_replies_received = register_counter_with_registry!(
            Opts::new("broker_replies_received_total", "Replies handed to a waiting caller"),
            registry
        )?;

        let broker_replies_dropped = register_counter_with_registry!(
            Opts::new("broker_replies_dropped_total", "Replies with no waiting caller"),
            registry
        )?;

        let broker_timeouts = register_counter_with_registry!(
            Opts::new("broker_timeouts_total", "Calls that gave up waiting for a reply"),
            registry
        )?;

        let broker_errors = register_counter_with_registry!(
            Opts::new("broker_errors_total", "Calls failed by serialization, publish or decode errors"),
            registry
        )?;

        let broker_round_trip = register_histogram_with_registry!(
            HistogramOpts::new("broker_round_trip_seconds", "Time from publish to decoded reply")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 4.0]),
            registry
        )?;

        let pending_calls = register_gauge_with_registry!(
            Opts::new("broker_pending_calls", "Calls currently waiting for a reply"),
            registry
        )?;

        let dispatcher_requests_processed = register_counter_with_registry!(
            Opts::new("dispatcher_requests_processed_total", "Requests answered by the dispatcher"),
            registry
        )?;

        let dispatcher_decode_failures = register_counter_with_registry!(
            Opts::new("dispatcher_decode_failures_total", "Requests skipped because they could not be decoded"),
            registry
        )?;

        let dispatcher_publish_failures = register_counter_with_registry!(
            Opts::new("dispatcher_publish_failures_total", "Replies that could not be published"),
            registry
        )?;

        let registrations_accepted = register_counter_with_registry!(
            Opts::new("registrations_accepted_total", "Registrations that reserved a place"),
            registry
        )?;

        let registrations_rejected = register_counter_with_registry!(
            Opts::new("registrations_rejected_total", "Registrations that were refused"),
            registry
        )?;

        Ok(Self {
            registry,
            broker_requests_sent,
            broker_replies_received,
            broker_replies_dropped,
            broker_timeouts,
            broker_errors,
            broker_round_trip,
            pending_calls,
            dispatcher_requests_processed,
            dispatcher_decode_failures,
            dispatcher_publish_failures,
            registrations_accepted,
            registrations_rejected,
        })
    }

    /// Export metrics in Prometheus format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| BookingError::InvalidArgument(format!("Metrics are not UTF-8: {}", e)))
    }

    pub fn record_round_trip(&self, duration: Duration) {
        self.broker_replies_received.inc();
        self.broker_round_trip.observe(duration.as_secs_f64());
    }

    pub fn record_registration(&self, accepted: bool) {
        self.dispatcher_requests_processed.inc();
        if accepted {
            self.registrations_accepted.inc();
        } else {
            self.registrations_rejected.inc();
        }
    }

    pub fn pending_call_opened(&self) {
        self.pending_calls.inc();
    }

    /// Account for `count` slots leaving the pending table.
    pub fn pending_calls_closed(&self, count: usize) {
        self.pending_calls.sub(count as f64);
    }
}

/// Metrics endpoint for Prometheus scraping
pub async fn metrics_endpoint(
    axum::extract::State(metrics): axum::extract::State<Metrics>,
) -> axum::response::Result<String> {
    match metrics.export() {
        Ok(metrics_data) => Ok(metrics_data),
        Err(e) => {
            tracing::error!("Failed to export metrics: {}", e);
            Err(axum::response::ErrorResponse::from(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
