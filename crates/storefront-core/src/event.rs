//! Event-history records appended by the fan-out router.
//!
//! A [`DomainEvent`] is written once per accepted change notification and
//! never mutated afterwards. The storage layer removes it passively once
//! `expires_at` has passed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Primary business entities whose creation is recorded in the event history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// An imported invoice line.
    Invoice,
    /// A customer order.
    Order,
}

impl EntityKind {
    /// Prefix shared by every subject key of this entity kind.
    #[must_use]
    pub fn subject_prefix(self) -> &'static str {
        match self {
            Self::Invoice => "#invoice_",
            Self::Order => "#order_",
        }
    }

    /// The event type recorded when an entity of this kind is created.
    #[must_use]
    pub fn created_event_type(self) -> EventType {
        match self {
            Self::Invoice => EventType::InvoiceCreated,
            Self::Order => EventType::OrderCreated,
        }
    }
}

/// Event type identifier for an invoice creation.
pub const INVOICE_CREATED_EVENT_TYPE: &str = "INVOICE_CREATED";

/// Event type identifier for an order creation.
pub const ORDER_CREATED_EVENT_TYPE: &str = "ORDER_CREATED";

/// Kinds of events held in the event history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// An invoice was created.
    InvoiceCreated,
    /// An order was created.
    OrderCreated,
}

impl EventType {
    /// Returns the wire name of the event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvoiceCreated => INVOICE_CREATED_EVENT_TYPE,
            Self::OrderCreated => ORDER_CREATED_EVENT_TYPE,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            INVOICE_CREATED_EVENT_TYPE => Ok(Self::InvoiceCreated),
            ORDER_CREATED_EVENT_TYPE => Ok(Self::OrderCreated),
            other => Err(DomainError::Validation(format!("unknown event type: {other}"))),
        }
    }
}

/// Builds the subject key for an entity owner, e.g. `#invoice_a`.
#[must_use]
pub fn subject_key(entity: EntityKind, owner: &str) -> String {
    format!("{}{owner}", entity.subject_prefix())
}

/// Builds the chronological sort key `{EVENT_TYPE}#{epoch millis}`.
#[must_use]
pub fn sort_key(event_type: EventType, occurred_at: DateTime<Utc>) -> String {
    format!("{}#{}", event_type.as_str(), occurred_at.timestamp_millis())
}

/// A single entry in the event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Business entity owner stream, e.g. `#invoice_a`.
    pub subject_key: String,
    /// `{EVENT_TYPE}#{epoch millis}`; ascending per subject.
    pub sort_key: String,
    /// Kind of event.
    pub event_type: EventType,
    /// Identifier of the entity that changed (invoice number, order id).
    /// Part of the storage key, so entities sharing a sort key coexist.
    pub entity_id: String,
    /// Contact address of the entity owner.
    pub owner_email: String,
    /// Transaction or request the change belongs to, if known.
    pub correlation_id: Option<Uuid>,
    /// Entity-specific derived fields.
    pub payload: serde_json::Value,
    /// Capture time of the originating change.
    pub occurred_at: DateTime<Utc>,
    /// Time after which the storage layer may drop the entry.
    pub expires_at: DateTime<Utc>,
}

/// Inputs for recording the creation of a primary entity.
#[derive(Debug, Clone)]
pub struct EntityCreated {
    /// Kind of entity created.
    pub entity: EntityKind,
    /// Owner segment of the entity's partition key.
    pub owner: String,
    /// Identifier of the created entity.
    pub entity_id: String,
    /// Contact address of the owner.
    pub owner_email: String,
    /// Correlation back to the originating transaction.
    pub correlation_id: Option<Uuid>,
    /// Derived fields copied into the event history.
    pub payload: serde_json::Value,
}

impl DomainEvent {
    /// Records the creation of a primary entity observed at `occurred_at`.
    #[must_use]
    pub fn entity_created(created: EntityCreated, occurred_at: DateTime<Utc>, ttl: Duration) -> Self {
        let event_type = created.entity.created_event_type();
        Self {
            subject_key: subject_key(created.entity, &created.owner),
            sort_key: sort_key(event_type, occurred_at),
            event_type,
            entity_id: created.entity_id,
            owner_email: created.owner_email,
            correlation_id: created.correlation_id,
            payload: created.payload,
            occurred_at,
            expires_at: occurred_at + ttl,
        }
    }

    /// Expiry expressed in epoch seconds, the unit the store's TTL uses.
    #[must_use]
    pub fn ttl_epoch_seconds(&self) -> i64 {
        self.expires_at.timestamp()
    }

    /// Whether the entry has outlived its time-to-live at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
