//! Storage ports for the event history and the transaction table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{DomainEvent, EventType};
use crate::transaction::{Transaction, TransactionStatus};

/// Append-only event history keyed by subject.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Puts an event. An event with the same subject, sort key and entity
    /// id is overwritten, which makes redelivered appends idempotent.
    async fn append(&self, event: &DomainEvent) -> Result<(), DomainError>;

    /// Load all events for a subject, ordered by sort key then entity id.
    async fn load_by_subject(&self, subject_key: &str) -> Result<Vec<DomainEvent>, DomainError>;

    /// Load the events of one type for a subject, ordered by sort key.
    async fn load_by_subject_and_type(
        &self,
        subject_key: &str,
        event_type: EventType,
    ) -> Result<Vec<DomainEvent>, DomainError>;

    /// Deletes events whose expiry is at or before `now`. Returns the number
    /// of events removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}

/// Single-key access to tracked transactions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts a new transaction.
    async fn insert(&self, transaction: &Transaction) -> Result<(), DomainError>;

    /// Looks up a transaction by id.
    async fn find(&self, transaction_id: Uuid) -> Result<Option<Transaction>, DomainError>;

    /// Sets `status` only if the stored status is not yet terminal.
    /// Returns `false` when no open row matched.
    async fn complete(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<bool, DomainError>;

    /// Lists transactions whose expiry is at or before `now`, oldest expiry
    /// first. Rows stay in place until [`remove_expired`](Self::remove_expired).
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, DomainError>;

    /// Deletes one transaction if its expiry is at or before `now`.
    /// Returns `false` when no such row remained.
    async fn remove_expired(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;
}
