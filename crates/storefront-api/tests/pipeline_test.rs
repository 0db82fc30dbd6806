//! End-to-end tests of the change feed through the HTTP surface.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};
use storefront_api::sweeper;
use uuid::Uuid;

fn created(kind: &str, pk: &str, sk: &str, extra: &Value) -> Value {
    let mut image = json!({"recordKind": kind, "pk": pk, "sk": sk});
    if let (Some(image), Some(extra)) = (image.as_object_mut(), extra.as_object()) {
        image.extend(extra.clone());
    }
    json!({
        "eventId": format!("evt-{sk}"),
        "changeKind": "CREATED",
        "capturedAt": common::fixed_now(),
        "afterImage": image
    })
}

#[tokio::test]
async fn test_created_invoice_is_readable_from_event_history() {
    // Arrange
    let app = common::TestApp::new(&[]);
    let batch = json!([created(
        "invoice",
        "user_a",
        "ABC-111",
        &json!({"email": "a@x.com", "productId": "p-1", "quantity": 4})
    )]);

    // Act
    let (status, report) = common::post_json(app.router(), "/api/v1/changes", &batch).await;
    let (read_status, views) = common::get_json(app.router(), "/api/v1/events/%23invoice_a").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({"processed": 1, "deadLettered": 0, "attempts": 1}));
    assert_eq!(read_status, StatusCode::OK);
    assert_eq!(views.as_array().unwrap().len(), 1);
    assert_eq!(views[0]["entityId"], "ABC-111");
    assert_eq!(views[0]["derivedFields"]["quantity"], 4);

    let stored = app.events.events();
    assert_eq!(
        stored[0].sort_key,
        format!("INVOICE_CREATED#{}", common::fixed_now().timestamp_millis())
    );
    assert_eq!(stored[0].ttl_epoch_seconds(), common::fixed_now().timestamp() + 3600);
}

#[tokio::test]
async fn test_poison_record_is_dead_lettered_while_others_flow() {
    // Arrange
    let app = common::TestApp::new(&[]);
    let mut records: Vec<Value> = (1..=5)
        .map(|i| {
            created(
                "order",
                "customer_b",
                &format!("order-{i}"),
                &json!({"productCodes": ["COD1"]}),
            )
        })
        .collect();
    records[2] = json!({"changeKind": "CREATED", "capturedAt": common::fixed_now()});

    // Act
    let (status, report) =
        common::post_json(app.router(), "/api/v1/changes", &Value::Array(records.clone())).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["processed"], 4);
    assert_eq!(report["deadLettered"], 1);
    let letters = app.dead_letters.letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].records, vec![records[2].clone()]);
    let stored = app.events.events();
    let ids: Vec<&str> = stored.iter().map(|e| e.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["order-1", "order-2", "order-4", "order-5"]);
    assert!(stored.iter().all(|e| e.subject_key == "#order_b"));
}

#[tokio::test]
async fn test_expired_transaction_times_out_waiting_client_once() {
    // Arrange
    let app = common::TestApp::new(&["conn-7"]);
    let (status, created) = common::post_json(
        app.router(),
        "/api/v1/transactions",
        &json!({"channelHandle": "conn-7"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let transaction_id = Uuid::parse_str(created["transactionId"].as_str().unwrap()).unwrap();
    let expired = app.transactions.get(transaction_id).unwrap();
    let removal = storefront_pipeline::domain::notification::ChangeNotification::transaction_expired(
        &expired,
        expired.expires_at,
    );

    // Act
    let (first, _) = common::post_json(app.router(), "/api/v1/changes", &json!([removal])).await;
    let (second, _) = common::post_json(app.router(), "/api/v1/changes", &json!([removal])).await;

    // Assert
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(app.audit.emitted().len(), 1);
    let pushes = app.gateway.pushes();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].1.contains("TIMEOUT"));
    assert_eq!(app.gateway.closes().len(), 1);
}

#[tokio::test]
async fn test_completed_transaction_is_not_timed_out_by_sweeper() {
    // Arrange
    let app = common::TestApp::new(&["conn-1"]);
    let (_, created) = common::post_json(
        app.router(),
        "/api/v1/transactions",
        &json!({"channelHandle": "conn-1"}),
    )
    .await;
    let id = created["transactionId"].as_str().unwrap().to_owned();
    let (status, completed) = common::post_json(
        app.router(),
        &format!("/api/v1/transactions/{id}/complete"),
        &json!({"status": "PROCESSED"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "PROCESSED");

    // Act: the fixed clock sits at the start time, so nothing has expired.
    let report = sweeper::sweep_once(&app.state).await.unwrap();

    // Assert
    assert_eq!(report.delivery.processed, 0);
    assert!(app.audit.emitted().is_empty());
    assert!(app.gateway.calls().is_empty());
    let (status, fetched) =
        common::get_json(app.router(), &format!("/api/v1/transactions/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "PROCESSED");
}
