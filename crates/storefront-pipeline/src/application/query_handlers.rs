//! Query handlers over the event history.
//!
//! Entries past their expiry are hidden even if the store has not purged
//! them yet.

use chrono::{DateTime, Utc};
use serde::Serialize;
use storefront_core::clock::Clock;
use storefront_core::error::DomainError;
use storefront_core::event::{DomainEvent, EventType};
use storefront_core::repository::EventStore;
use uuid::Uuid;

/// Read-only view of one event-history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    /// The subject the entry belongs to.
    pub subject_key: String,
    /// Contact address of the entity owner.
    pub email: String,
    /// Capture time of the originating change.
    pub created_at: DateTime<Utc>,
    /// Kind of event.
    pub event_type: EventType,
    /// Transaction or request the change belongs to.
    pub correlation_id: Option<Uuid>,
    /// Identifier of the entity that changed.
    pub entity_id: String,
    /// Entity-specific derived fields.
    pub derived_fields: serde_json::Value,
}

impl From<DomainEvent> for EventView {
    fn from(event: DomainEvent) -> Self {
        Self {
            subject_key: event.subject_key,
            email: event.owner_email,
            created_at: event.occurred_at,
            event_type: event.event_type,
            correlation_id: event.correlation_id,
            entity_id: event.entity_id,
            derived_fields: event.payload,
        }
    }
}

fn validate_subject(subject_key: &str) -> Result<(), DomainError> {
    if subject_key.trim().is_empty() {
        return Err(DomainError::Validation("subject key must not be empty".into()));
    }
    Ok(())
}

fn live_views(events: Vec<DomainEvent>, now: DateTime<Utc>) -> Vec<EventView> {
    events
        .into_iter()
        .filter(|event| !event.is_expired(now))
        .map(EventView::from)
        .collect()
}

/// Retrieves the live history of a subject in sort-key order.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty subject key and
/// propagates store errors.
pub async fn get_events_by_subject(
    subject_key: &str,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<Vec<EventView>, DomainError> {
    validate_subject(subject_key)?;
    let events = store.load_by_subject(subject_key).await?;
    Ok(live_views(events, clock.now()))
}

/// Retrieves the live history of one event type for a subject.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty subject key and
/// propagates store errors.
pub async fn get_events_by_subject_and_type(
    subject_key: &str,
    event_type: EventType,
    clock: &dyn Clock,
    store: &dyn EventStore,
) -> Result<Vec<EventView>, DomainError> {
    validate_subject(subject_key)?;
    let events = store.load_by_subject_and_type(subject_key, event_type).await?;
    Ok(live_views(events, clock.now()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use storefront_core::event::{EntityCreated, EntityKind};
    use storefront_test_support::{FailingEventStore, FixedClock, InMemoryEventStore};

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn created(entity: EntityKind, entity_id: &str, at: DateTime<Utc>) -> DomainEvent {
        DomainEvent::entity_created(
            EntityCreated {
                entity,
                owner: "a".to_owned(),
                entity_id: entity_id.to_owned(),
                owner_email: "a@x.com".to_owned(),
                correlation_id: None,
                payload: json!({"id": entity_id}),
            },
            at,
            Duration::seconds(3600),
        )
    }

    #[tokio::test]
    async fn test_get_events_by_subject_returns_views_in_order() {
        // Arrange
        let store = InMemoryEventStore::with_events(vec![
            created(EntityKind::Invoice, "INV-2", fixed_now() + Duration::seconds(1)),
            created(EntityKind::Invoice, "INV-1", fixed_now()),
            created(EntityKind::Order, "ORD-1", fixed_now()),
        ]);
        let clock = FixedClock(fixed_now() + Duration::seconds(10));

        // Act
        let views = get_events_by_subject("#invoice_a", &clock, &store).await.unwrap();

        // Assert
        let ids: Vec<&str> = views.iter().map(|v| v.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["INV-1", "INV-2"]);
        assert_eq!(views[0].email, "a@x.com");
        assert_eq!(views[0].created_at, fixed_now());
        assert_eq!(views[0].derived_fields, json!({"id": "INV-1"}));
    }

    #[tokio::test]
    async fn test_expired_entries_are_hidden() {
        let store = InMemoryEventStore::with_events(vec![
            created(EntityKind::Invoice, "OLD", fixed_now()),
            created(EntityKind::Invoice, "NEW", fixed_now() + Duration::seconds(3000)),
        ]);
        let clock = FixedClock(fixed_now() + Duration::seconds(3600));

        let views = get_events_by_subject("#invoice_a", &clock, &store).await.unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].entity_id, "NEW");
    }

    #[tokio::test]
    async fn test_get_events_by_subject_and_type_filters() {
        let mut order = created(EntityKind::Order, "ORD-1", fixed_now());
        order.subject_key = "#invoice_a".to_owned();
        let store = InMemoryEventStore::with_events(vec![
            created(EntityKind::Invoice, "INV-1", fixed_now()),
            order,
        ]);

        let views = get_events_by_subject_and_type(
            "#invoice_a",
            EventType::InvoiceCreated,
            &FixedClock(fixed_now()),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].event_type, EventType::InvoiceCreated);
    }

    #[tokio::test]
    async fn test_empty_subject_is_validation_error() {
        let result =
            get_events_by_subject(" ", &FixedClock(fixed_now()), &InMemoryEventStore::new()).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let result =
            get_events_by_subject("#invoice_a", &FixedClock(fixed_now()), &FailingEventStore).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = EventView::from(created(EntityKind::Invoice, "INV-1", fixed_now()));

        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["subjectKey"], "#invoice_a");
        assert_eq!(json["eventType"], "INVOICE_CREATED");
        assert_eq!(json["derivedFields"]["id"], "INV-1");
        assert!(json["correlationId"].is_null());
    }
}
