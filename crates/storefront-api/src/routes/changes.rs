//! Change-feed intake.
//!
//! Accepts a batch of raw change notifications and runs it through the
//! fan-out router under the retry policy. Poison records are dead-lettered
//! rather than failing the request.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use serde_json::Value;
use storefront_pipeline::application::retry::DeliveryReport;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /
#[instrument(skip(state, records), fields(records = records.len()))]
async fn receive_changes(
    State(state): State<AppState>,
    Json(records): Json<Vec<Value>>,
) -> Result<Json<DeliveryReport>, ApiError> {
    info!("handling change batch");
    let report = state.deliver(&records).await?;
    Ok(Json(report))
}

/// Returns the change-feed router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(receive_changes))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use std::sync::Arc;
    use storefront_test_support::FailingDeadLetterSink;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::testing::{Fixture, fixed_now};

    fn post_changes(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn invoice_created(sk: &str) -> Value {
        json!({
            "changeKind": "CREATED",
            "capturedAt": fixed_now(),
            "afterImage": {
                "recordKind": "invoice",
                "pk": "user_a",
                "sk": sk,
                "productId": "p-1",
                "quantity": 1
            }
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_receive_changes_returns_delivery_report() {
        // Arrange
        let fixture = Fixture::new();
        let app = router().with_state(fixture.state.clone());
        let body = json!([invoice_created("ABC-1"), {"changeKind": "bogus"}]);

        // Act
        let response = app.oneshot(post_changes(&body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["processed"], 1);
        assert_eq!(json["deadLettered"], 1);
        assert_eq!(fixture.events.events().len(), 1);
        assert_eq!(fixture.dead_letters.letters().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_changes_notifies_timed_out_client() {
        // Arrange
        let fixture = Fixture::new();
        let app = router().with_state(fixture.state.clone());
        let body = json!([{
            "changeKind": "REMOVED",
            "capturedAt": fixed_now(),
            "beforeImage": {
                "recordKind": "transaction",
                "pk": "#transaction",
                "sk": Uuid::new_v4(),
                "connectionId": "conn-1",
                "transactionStatus": "PENDING"
            }
        }]);

        // Act
        let response = app.oneshot(post_changes(&body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fixture.audit.emitted().len(), 1);
        assert_eq!(fixture.gateway.pushes().len(), 1);
        assert_eq!(fixture.gateway.closes().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_changes_returns_500_when_dead_letter_sink_fails() {
        // Arrange
        let mut fixture = Fixture::new();
        fixture.state.ports.dead_letters = Arc::new(FailingDeadLetterSink);
        let app = router().with_state(fixture.state.clone());

        // Act
        let response = app
            .oneshot(post_changes(&json!([{"changeKind": "bogus"}])))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "infrastructure_error");
    }

    #[tokio::test]
    async fn test_receive_changes_rejects_non_array_body() {
        let app = router().with_state(Fixture::new().state);

        let response = app
            .oneshot(post_changes(&json!({"changeKind": "CREATED"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
