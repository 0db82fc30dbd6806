//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use storefront_core::error::DomainError;
use storefront_core::event::{DomainEvent, EventType};
use storefront_core::repository::EventStore;

use crate::infrastructure;

const SELECT_COLUMNS: &str = "subject_key, sort_key, event_type, entity_id, owner_email, \
     correlation_id, payload, occurred_at, expires_at";

/// PostgreSQL-backed event history.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn event_from_row(row: &PgRow) -> Result<DomainEvent, DomainError> {
    let event_type: String = row.try_get("event_type").map_err(infrastructure)?;
    Ok(DomainEvent {
        subject_key: row.try_get("subject_key").map_err(infrastructure)?,
        sort_key: row.try_get("sort_key").map_err(infrastructure)?,
        event_type: event_type.parse()?,
        entity_id: row.try_get("entity_id").map_err(infrastructure)?,
        owner_email: row.try_get("owner_email").map_err(infrastructure)?,
        correlation_id: row
            .try_get::<Option<Uuid>, _>("correlation_id")
            .map_err(infrastructure)?,
        payload: row.try_get("payload").map_err(infrastructure)?,
        occurred_at: row.try_get("occurred_at").map_err(infrastructure)?,
        expires_at: row.try_get("expires_at").map_err(infrastructure)?,
    })
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, event: &DomainEvent) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO domain_events (
                subject_key, sort_key, event_type, entity_id, owner_email,
                correlation_id, payload, occurred_at, expires_at, ttl
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (subject_key, sort_key, entity_id) DO UPDATE SET
                event_type = EXCLUDED.event_type,
                owner_email = EXCLUDED.owner_email,
                correlation_id = EXCLUDED.correlation_id,
                payload = EXCLUDED.payload,
                occurred_at = EXCLUDED.occurred_at,
                expires_at = EXCLUDED.expires_at,
                ttl = EXCLUDED.ttl
            ",
        )
        .bind(&event.subject_key)
        .bind(&event.sort_key)
        .bind(event.event_type.as_str())
        .bind(&event.entity_id)
        .bind(&event.owner_email)
        .bind(event.correlation_id)
        .bind(&event.payload)
        .bind(event.occurred_at)
        .bind(event.expires_at)
        .bind(event.ttl_epoch_seconds())
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;

        tracing::debug!(
            subject_key = %event.subject_key,
            sort_key = %event.sort_key,
            "event appended"
        );
        Ok(())
    }

    async fn load_by_subject(&self, subject_key: &str) -> Result<Vec<DomainEvent>, DomainError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM domain_events \
             WHERE subject_key = $1 ORDER BY sort_key COLLATE \"C\" ASC, entity_id COLLATE \"C\" ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(subject_key)
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn load_by_subject_and_type(
        &self,
        subject_key: &str,
        event_type: EventType,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM domain_events \
             WHERE subject_key = $1 AND event_type = $2 \
             ORDER BY sort_key COLLATE \"C\" ASC, entity_id COLLATE \"C\" ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(subject_key)
            .bind(event_type.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM domain_events WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(result.rows_affected())
    }
}
