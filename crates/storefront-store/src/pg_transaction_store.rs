//! `PostgreSQL` implementation of the `TransactionStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use storefront_core::channel::ConnectionHandle;
use storefront_core::error::DomainError;
use storefront_core::repository::TransactionStore;
use storefront_core::transaction::{Transaction, TransactionStatus};

use crate::infrastructure;

/// PostgreSQL-backed transaction table.
#[derive(Debug, Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    /// Creates a new `PgTransactionStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction, DomainError> {
    let status: String = row.try_get("status").map_err(infrastructure)?;
    let handle: String = row.try_get("channel_handle").map_err(infrastructure)?;
    Ok(Transaction {
        transaction_id: row.try_get("transaction_id").map_err(infrastructure)?,
        channel_handle: ConnectionHandle::new(handle),
        // Rows written by other producers may carry statuses this build
        // does not know; those stay open.
        status: status.parse().unwrap_or(TransactionStatus::Unknown),
        started_at: row.try_get("started_at").map_err(infrastructure)?,
        expires_at: row.try_get("expires_at").map_err(infrastructure)?,
    })
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, transaction: &Transaction) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO transactions (transaction_id, channel_handle, status, started_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(transaction.transaction_id)
        .bind(transaction.channel_handle.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.started_at)
        .bind(transaction.expires_at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn find(&self, transaction_id: Uuid) -> Result<Option<Transaction>, DomainError> {
        let row = sqlx::query(
            r"
            SELECT transaction_id, channel_handle, status, started_at, expires_at
            FROM transactions
            WHERE transaction_id = $1
            ",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn complete(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE transactions SET status = $2
            WHERE transaction_id = $1
              AND status NOT IN ('PROCESSED', 'TIMEOUT', 'FAILED')
            ",
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, DomainError> {
        let rows = sqlx::query(
            r"
            SELECT transaction_id, channel_handle, status, started_at, expires_at
            FROM transactions
            WHERE expires_at <= $1
            ORDER BY expires_at ASC
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn remove_expired(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "DELETE FROM transactions WHERE transaction_id = $1 AND expires_at <= $2",
        )
        .bind(transaction_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(result.rows_affected() == 1)
    }
}
