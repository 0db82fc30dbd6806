//! Storefront Store — `PostgreSQL` adapters for the storage ports.
//!
//! Every adapter uses single-key statements only: puts, conditional
//! updates, and delete-returning sweeps. No multi-row transactions or locks.

pub mod pg_dead_letter_sink;
pub mod pg_event_store;
pub mod pg_notification_ledger;
pub mod pg_transaction_store;
pub mod schema;

use storefront_core::error::DomainError;

pub(crate) fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}
