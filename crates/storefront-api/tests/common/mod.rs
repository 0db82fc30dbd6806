//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use storefront_api::routes;
use storefront_api::state::{AppState, PipelineSettings, Ports};
use storefront_pipeline::application::retry::RetryPolicy;
use storefront_pipeline::application::router::RouterSettings;
use storefront_test_support::{
    FixedClock, InMemoryEventStore, InMemoryNotificationLedger, InMemoryTransactionStore,
    RecordingAuditBus, RecordingChannelGateway, RecordingDeadLetterSink,
};
use tower::ServiceExt;

/// Fixed timestamp used across all integration tests.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// The full app wired to in-memory doubles, with handles on the doubles.
pub struct TestApp {
    pub state: AppState,
    pub events: Arc<InMemoryEventStore>,
    pub transactions: Arc<InMemoryTransactionStore>,
    pub gateway: Arc<RecordingChannelGateway>,
    pub audit: Arc<RecordingAuditBus>,
    pub dead_letters: Arc<RecordingDeadLetterSink>,
}

impl TestApp {
    /// Builds the app with `live` as the open client connections.
    pub fn new(live: &[&str]) -> Self {
        let events = Arc::new(InMemoryEventStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let gateway = Arc::new(RecordingChannelGateway::with_live(live));
        let audit = Arc::new(RecordingAuditBus::new());
        let dead_letters = Arc::new(RecordingDeadLetterSink::new());
        let state = AppState::new(
            Ports {
                clock: Arc::new(FixedClock(fixed_now())),
                event_store: events.clone(),
                transaction_store: transactions.clone(),
                gateway: gateway.clone(),
                audit_bus: audit.clone(),
                ledger: Arc::new(InMemoryNotificationLedger::new()),
                dead_letters: dead_letters.clone(),
            },
            PipelineSettings {
                router: RouterSettings::default(),
                retry: RetryPolicy {
                    base_backoff: std::time::Duration::from_millis(1),
                    ..RetryPolicy::default()
                },
                transaction_ttl: chrono::Duration::seconds(120),
                ledger_retention: chrono::Duration::seconds(86_400),
            },
        );
        Self {
            state,
            events,
            transactions,
            gateway,
            audit,
            dead_letters,
        }
    }

    /// Uses the same route structure as `main.rs`.
    pub fn router(&self) -> Router {
        routes::api_router().with_state(self.state.clone())
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
