//! `PostgreSQL` implementation of the `DeadLetterSink` trait.

use async_trait::async_trait;
use sqlx::PgPool;

use storefront_core::dead_letter::{DeadLetter, DeadLetterSink};
use storefront_core::error::DomainError;

use crate::infrastructure;

/// Dead-letter queue stored in the `dead_letters` table.
#[derive(Debug, Clone)]
pub struct PgDeadLetterSink {
    pool: PgPool,
}

impl PgDeadLetterSink {
    /// Creates a new `PgDeadLetterSink`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for PgDeadLetterSink {
    async fn send(&self, letter: &DeadLetter) -> Result<(), DomainError> {
        let attempts = i32::try_from(letter.attempts)
            .map_err(|e| DomainError::Validation(format!("attempt count out of range: {e}")))?;
        sqlx::query(
            r"
            INSERT INTO dead_letters (id, records, error, attempts, failed_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(letter.id)
        .bind(serde_json::Value::Array(letter.records.clone()))
        .bind(&letter.error)
        .bind(attempts)
        .bind(letter.failed_at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;

        tracing::warn!(
            dead_letter_id = %letter.id,
            records = letter.records.len(),
            attempts = letter.attempts,
            "batch moved to dead-letter queue"
        );
        Ok(())
    }
}
