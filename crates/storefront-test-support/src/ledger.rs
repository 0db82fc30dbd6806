//! Test ledger — in-memory `NotificationLedger`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storefront_core::error::DomainError;
use storefront_core::ledger::NotificationLedger;

/// A ledger holding delivered keys and their delivery times in a map.
#[derive(Debug, Default)]
pub struct InMemoryNotificationLedger {
    keys: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryNotificationLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger holding `entries` as `(key, delivered_at)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_entries(entries: &[(&str, DateTime<Utc>)]) -> Self {
        let ledger = Self::new();
        ledger
            .keys
            .lock()
            .unwrap()
            .extend(entries.iter().map(|(key, at)| ((*key).to_owned(), *at)));
        ledger
    }

    /// Returns the recorded keys, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl NotificationLedger for InMemoryNotificationLedger {
    async fn is_recorded(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.keys.lock().unwrap().contains_key(key))
    }

    async fn record(&self, key: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.keys.lock().unwrap().entry(key.to_owned()).or_insert(at);
        Ok(())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut keys = self.keys.lock().unwrap();
        let before = keys.len();
        keys.retain(|_, delivered_at| *delivered_at >= cutoff);
        Ok((before - keys.len()) as u64)
    }
}
