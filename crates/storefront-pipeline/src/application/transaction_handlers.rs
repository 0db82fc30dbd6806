//! Command and query handlers for the transaction lifecycle.
//!
//! Transactions are opened by the API, completed by workers, and expired by
//! the sweeper. Expiry turns each expired row into the `REMOVED` change
//! notification the router consumes, so timeouts reach waiting clients the
//! same way whether the row was removed here or by the store itself. Rows
//! are only deleted once their notifications were delivered.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use storefront_core::clock::Clock;
use storefront_core::error::DomainError;
use storefront_core::repository::TransactionStore;
use storefront_core::transaction::Transaction;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::commands::{BeginTransaction, CompleteTransaction};
use crate::domain::notification::ChangeNotification;

/// Default lifetime of an open transaction.
pub const DEFAULT_TRANSACTION_TTL_SECS: i64 = 120;

/// Handles the `BeginTransaction` command: opens a pending transaction that
/// expires `ttl` from now.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the channel handle is empty, or the
/// store's error if the insert fails.
#[instrument(skip(clock, store), fields(transaction_id = %command.correlation_id))]
pub async fn handle_begin_transaction(
    command: &BeginTransaction,
    ttl: Duration,
    clock: &dyn Clock,
    store: &dyn TransactionStore,
) -> Result<Transaction, DomainError> {
    if command.channel_handle.as_str().trim().is_empty() {
        return Err(DomainError::Validation(
            "channel handle must not be empty".into(),
        ));
    }

    let transaction = Transaction::begin(
        command.correlation_id,
        command.channel_handle.clone(),
        clock.now(),
        ttl,
    );
    store.insert(&transaction).await?;

    info!(expires_at = %transaction.expires_at, "transaction opened");
    Ok(transaction)
}

/// Handles the `CompleteTransaction` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the transaction does not exist and
/// `DomainError::InvalidTransition` if it is already terminal, has been
/// completed concurrently, or `status` is not terminal.
#[instrument(skip(store), fields(transaction_id = %command.transaction_id, status = %command.status))]
pub async fn handle_complete_transaction(
    command: &CompleteTransaction,
    store: &dyn TransactionStore,
) -> Result<Transaction, DomainError> {
    let current = get_transaction(command.transaction_id, store).await?;
    let completed = current.transition(command.status)?;

    if !store.complete(command.transaction_id, command.status).await? {
        let from = store
            .find(command.transaction_id)
            .await?
            .map_or(current.status, |row| row.status);
        return Err(DomainError::InvalidTransition {
            transaction_id: command.transaction_id,
            from,
            to: command.status,
        });
    }

    info!("transaction completed");
    Ok(completed)
}

/// Retrieves a transaction by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no such transaction exists.
pub async fn get_transaction(
    transaction_id: Uuid,
    store: &dyn TransactionStore,
) -> Result<Transaction, DomainError> {
    store
        .find(transaction_id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("transaction {transaction_id}")))
}

/// Lists the transactions that have expired at `now` without removing them.
///
/// # Errors
///
/// Propagates store errors.
pub async fn find_expired_transactions(
    now: DateTime<Utc>,
    store: &dyn TransactionStore,
) -> Result<Vec<Transaction>, DomainError> {
    store.find_expired(now).await
}

/// Builds one raw `REMOVED` notification per transaction, captured at its
/// expiry time.
#[must_use]
pub fn expiry_notifications(expired: &[Transaction]) -> Vec<Value> {
    expired
        .iter()
        .map(|transaction| ChangeNotification::transaction_expired(transaction, transaction.expires_at))
        .collect()
}

/// Deletes `expired` rows that are still expired at `now`. Returns how many
/// rows were deleted.
///
/// # Errors
///
/// Propagates store errors.
pub async fn remove_expired_transactions(
    expired: &[Transaction],
    now: DateTime<Utc>,
    store: &dyn TransactionStore,
) -> Result<u64, DomainError> {
    let mut removed = 0;
    for transaction in expired {
        if store.remove_expired(transaction.transaction_id, now).await? {
            removed += 1;
        }
    }
    if removed > 0 {
        info!(count = removed, "expired transactions removed");
    }
    Ok(removed)
}
