//! `PostgreSQL` implementation of the `NotificationLedger` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use storefront_core::error::DomainError;
use storefront_core::ledger::NotificationLedger;

use crate::infrastructure;

/// Delivered-notification keys stored in `delivered_notifications`.
#[derive(Debug, Clone)]
pub struct PgNotificationLedger {
    pool: PgPool,
}

impl PgNotificationLedger {
    /// Creates a new `PgNotificationLedger`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLedger for PgNotificationLedger {
    async fn is_recorded(&self, key: &str) -> Result<bool, DomainError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT notification_key FROM delivered_notifications WHERE notification_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(row.is_some())
    }

    async fn record(&self, key: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO delivered_notifications (notification_key, delivered_at)
            VALUES ($1, $2)
            ON CONFLICT (notification_key) DO NOTHING
            ",
        )
        .bind(key)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM delivered_notifications WHERE delivered_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected())
    }
}
