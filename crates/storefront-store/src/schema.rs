//! Storage schema.

use sqlx::PgPool;
use storefront_core::error::DomainError;

/// SQL to create the event history table.
pub const CREATE_DOMAIN_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS domain_events (
    subject_key     TEXT NOT NULL,
    sort_key        TEXT NOT NULL,
    event_type      VARCHAR(64) NOT NULL,
    entity_id       TEXT NOT NULL,
    owner_email     TEXT NOT NULL,
    correlation_id  UUID,
    payload         JSONB NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    expires_at      TIMESTAMPTZ NOT NULL,
    ttl             BIGINT NOT NULL,
    PRIMARY KEY (subject_key, sort_key, entity_id)
)";

/// SQL to index the event history by expiry.
pub const CREATE_DOMAIN_EVENTS_EXPIRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_domain_events_expires_at
    ON domain_events (expires_at)";

/// SQL to create the transaction table.
pub const CREATE_TRANSACTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS transactions (
    transaction_id  UUID PRIMARY KEY,
    channel_handle  TEXT NOT NULL,
    status          VARCHAR(32) NOT NULL,
    started_at      TIMESTAMPTZ NOT NULL,
    expires_at      TIMESTAMPTZ NOT NULL
)";

/// SQL to index transactions by expiry.
pub const CREATE_TRANSACTIONS_EXPIRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_transactions_expires_at
    ON transactions (expires_at)";

/// SQL to create the dead-letter table.
pub const CREATE_DEAD_LETTERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS dead_letters (
    id          UUID PRIMARY KEY,
    records     JSONB NOT NULL,
    error       TEXT NOT NULL,
    attempts    INTEGER NOT NULL,
    failed_at   TIMESTAMPTZ NOT NULL
)";

/// SQL to create the delivered-notification ledger.
pub const CREATE_DELIVERED_NOTIFICATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS delivered_notifications (
    notification_key    TEXT PRIMARY KEY,
    delivered_at        TIMESTAMPTZ NOT NULL
)";

/// SQL to index the ledger by delivery time.
pub const CREATE_DELIVERED_NOTIFICATIONS_AGE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_delivered_notifications_delivered_at
    ON delivered_notifications (delivered_at)";

const SCHEMA: [&str; 7] = [
    CREATE_DOMAIN_EVENTS_TABLE,
    CREATE_DOMAIN_EVENTS_EXPIRY_INDEX,
    CREATE_TRANSACTIONS_TABLE,
    CREATE_TRANSACTIONS_EXPIRY_INDEX,
    CREATE_DEAD_LETTERS_TABLE,
    CREATE_DELIVERED_NOTIFICATIONS_TABLE,
    CREATE_DELIVERED_NOTIFICATIONS_AGE_INDEX,
];

/// Creates any missing tables and indexes.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DomainError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(crate::infrastructure)?;
    }
    tracing::info!("storage schema is up to date");
    Ok(())
}
