//! Delivery ledger used to suppress repeated user-visible notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainError;

/// Records which notifications have been fully delivered.
///
/// A key is recorded only after every side effect of a notification
/// succeeded, so a redelivered change may repeat a notification that failed
/// half-way but never skips one.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Returns whether `key` has already been delivered.
    async fn is_recorded(&self, key: &str) -> Result<bool, DomainError>;

    /// Marks `key` as delivered. Recording an existing key is a no-op.
    async fn record(&self, key: &str, at: DateTime<Utc>) -> Result<(), DomainError>;

    /// Forgets keys delivered before `cutoff`. Returns the number of keys
    /// removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
