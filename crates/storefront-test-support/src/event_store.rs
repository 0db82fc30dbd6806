//! Test event stores — `EventStore` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storefront_core::error::DomainError;
use storefront_core::event::{DomainEvent, EventType};
use storefront_core::repository::EventStore;

type EventKey = (String, String, String);

fn key_of(event: &DomainEvent) -> EventKey {
    (
        event.subject_key.clone(),
        event.sort_key.clone(),
        event.entity_id.clone(),
    )
}

/// An event store backed by an ordered map keyed by
/// `(subject, sort key, entity id)`. Appends with an existing key overwrite,
/// matching the production store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Mutex<BTreeMap<EventKey, DomainEvent>>,
    appends: Mutex<usize>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `events`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_events(events: Vec<DomainEvent>) -> Self {
        let store = Self::new();
        {
            let mut map = store.events.lock().unwrap();
            for event in events {
                map.insert(key_of(&event), event);
            }
        }
        store
    }

    /// Returns a snapshot of every stored event in key order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    /// Number of `append` calls, including overwrites.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn append_count(&self) -> usize {
        *self.appends.lock().unwrap()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &DomainEvent) -> Result<(), DomainError> {
        *self.appends.lock().unwrap() += 1;
        self.events.lock().unwrap().insert(key_of(event), event.clone());
        Ok(())
    }

    async fn load_by_subject(&self, subject_key: &str) -> Result<Vec<DomainEvent>, DomainError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|((subject, _, _), _)| subject == subject_key)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn load_by_subject_and_type(
        &self,
        subject_key: &str,
        event_type: EventType,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        let prefix = format!("{}#", event_type.as_str());
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|((subject, sort, _), _)| subject == subject_key && sort.starts_with(&prefix))
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|_, event| !event.is_expired(now));
        Ok((before - events.len()) as u64)
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(&self, _event: &DomainEvent) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_by_subject(&self, _subject_key: &str) -> Result<Vec<DomainEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_by_subject_and_type(
        &self,
        _subject_key: &str,
        _event_type: EventType,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
