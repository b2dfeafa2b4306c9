use crate::app::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use concert_booking::{metrics_endpoint, BookingOutcome, CorrelatedRequest, Registration};
use serde::Deserialize;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AddRecordParams {
    concert: Option<String>,
    user: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get-concerts", get(get_concerts))
        .route("/add-record", post(add_record))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_concerts(State(state): State<AppState>) -> Response {
    match state.booking.list_events().await {
        Ok(concerts) => (StatusCode::OK, Json(concerts)).into_response(),
        Err(e) => {
            error!("Error listing concerts: {}", e);
            server_error()
        }
    }
}

async fn add_record(
    State(state): State<AppState>,
    Query(params): Query<AddRecordParams>,
) -> Response {
    let (Some(concert), Some(user)) = (non_empty(params.concert), non_empty(params.user)) else {
        warn!("Request parameters are missing");
        return client_error(StatusCode::BAD_REQUEST.canonical_reason().unwrap_or("Bad Request"));
    };

    let request = CorrelatedRequest::new(&Uuid::new_v4().to_string(), Registration::new(&user, &concert));

    match state.broker.send(&request).await {
        Ok(reply) => {
            info!(correlation_id = %request.id, "Response: {}", reply);
            reply_to_response(&reply)
        }
        Err(e) => {
            error!(correlation_id = %request.id, "Broker error: {}", e);
            server_error()
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "booking-service",
        "pending_calls": state.broker.pending().len(),
    }))
}

/// Map a dispatcher reply onto the HTTP contract. Sold out is answered with
/// 200 and the reply text, not an error status.
fn reply_to_response(reply: &str) -> Response {
    match BookingOutcome::from_reply(reply) {
        BookingOutcome::Reserved => (StatusCode::CREATED, reply.to_string()).into_response(),
        BookingOutcome::SoldOut => (StatusCode::OK, reply.to_string()).into_response(),
        BookingOutcome::NoSuchConcert | BookingOutcome::AlreadyRegistered => client_error(reply),
        BookingOutcome::Failed(message) => {
            error!("Booking failed: {}", message);
            server_error()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn client_error(body: &str) -> Response {
    (StatusCode::BAD_REQUEST, body.to_string()).into_response()
}

fn server_error() -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (status, status.canonical_reason().unwrap_or("Internal Server Error")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use concert_booking::{
        EventStore, MemoryEventStore, ServiceConfig, ShutdownCoordinator, Concert,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_router(concerts: Vec<Concert>) -> (Router, ShutdownCoordinator) {
        let config = ServiceConfig {
            reply_timeout_ms: 1_000,
            ..ServiceConfig::default()
        };
        let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::with_concerts(concerts));
        let coordinator = ShutdownCoordinator::default();
        let state = app::start_in_memory(&config, store, &coordinator).await.unwrap();
        (router(state), coordinator)
    }

    async fn call(router: &Router, method: &str, uri: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn add_record_reserves_place() {
        let (router, _coordinator) = test_router(vec![Concert::new("jazz", 2)]).await;

        let (status, body) = call(&router, "POST", "/add-record?concert=jazz&user=alice").await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, "Place reserved");
    }

    #[tokio::test]
    async fn add_record_requires_both_parameters() {
        let (router, _coordinator) = test_router(vec![Concert::new("jazz", 2)]).await;

        let (status, _) = call(&router, "POST", "/add-record?concert=jazz").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&router, "POST", "/add-record?concert=&user=alice").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn domain_rejections_map_to_status_codes() {
        let (router, _coordinator) = test_router(vec![Concert::new("jazz", 2)]).await;

        let (status, body) = call(&router, "POST", "/add-record?concert=rock&user=alice").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "no such concert");

        let (status, _) = call(&router, "POST", "/add-record?concert=jazz&user=alice").await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&router, "POST", "/add-record?concert=jazz&user=alice").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "user is already registered");

        let (status, _) = call(&router, "POST", "/add-record?concert=jazz&user=bob").await;
        assert_eq!(status, StatusCode::CREATED);

        // Sold out is informative, not an error.
        let (status, body) = call(&router, "POST", "/add-record?concert=jazz&user=carol").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "sold out");
    }

    #[tokio::test]
    async fn get_concerts_lists_current_state() {
        let (router, _coordinator) =
            test_router(vec![Concert::new("rock", 10), Concert::new("jazz", 1)]).await;
        call(&router, "POST", "/add-record?concert=jazz&user=alice").await;

        let (status, body) = call(&router, "GET", "/get-concerts").await;
        assert_eq!(status, StatusCode::OK);

        let concerts: Vec<Concert> = serde_json::from_str(&body).unwrap();
        assert_eq!(concerts.len(), 2);
        assert_eq!(concerts[0].name, "jazz");
        assert_eq!(concerts[0].occupied, 1);
        assert!(concerts[0].sold_out);
        assert_eq!(concerts[1].name, "rock");
        assert!(!concerts[1].sold_out);
    }

    #[tokio::test]
    async fn broker_failure_is_a_server_error() {
        let (router, coordinator) = test_router(vec![Concert::new("jazz", 1)]).await;
        coordinator.shutdown().await.unwrap();

        let (status, _) = call(&router, "POST", "/add-record?concert=jazz&user=alice").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn metrics_and_health_are_exposed() {
        let (router, _coordinator) = test_router(vec![Concert::new("jazz", 1)]).await;
        call(&router, "POST", "/add-record?concert=jazz&user=alice").await;

        let (status, body) = call(&router, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("registrations_accepted_total 1"));

        let (status, body) = call(&router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"healthy\""));
    }
}
