//! Test transaction store — in-memory `TransactionStore`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storefront_core::error::DomainError;
use storefront_core::repository::TransactionStore;
use storefront_core::transaction::{Transaction, TransactionStatus};
use uuid::Uuid;

/// A transaction table held in a map. Conditional updates behave like the
/// production store: only non-terminal rows are completed.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    rows: Mutex<HashMap<Uuid, Transaction>>,
}

impl InMemoryTransactionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `transactions`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let store = Self::new();
        store
            .rows
            .lock()
            .unwrap()
            .extend(transactions.into_iter().map(|t| (t.transaction_id, t)));
        store
    }

    /// Returns the stored row for `transaction_id`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, transaction_id: Uuid) -> Option<Transaction> {
        self.rows.lock().unwrap().get(&transaction_id).cloned()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: &Transaction) -> Result<(), DomainError> {
        self.rows
            .lock()
            .unwrap()
            .insert(transaction.transaction_id, transaction.clone());
        Ok(())
    }

    async fn find(&self, transaction_id: Uuid) -> Result<Option<Transaction>, DomainError> {
        Ok(self.get(transaction_id))
    }

    async fn complete(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&transaction_id) {
            Some(row) if !row.status.is_terminal() => {
                row.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, DomainError> {
        let mut expired: Vec<Transaction> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.expires_at <= now)
            .cloned()
            .collect();
        expired.sort_by_key(|t| t.expires_at);
        Ok(expired)
    }

    async fn remove_expired(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let expired = rows
            .get(&transaction_id)
            .is_some_and(|row| row.expires_at <= now);
        Ok(expired && rows.remove(&transaction_id).is_some())
    }
}
