//! Test audit buses — `AuditBus` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use storefront_core::audit::{AuditBus, AuditRecord};
use storefront_core::error::DomainError;

/// An audit bus that records every emitted record and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingAuditBus {
    emitted: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditBus {
    /// Create an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all emitted records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn emitted(&self) -> Vec<AuditRecord> {
        self.emitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditBus for RecordingAuditBus {
    async fn emit(&self, record: &AuditRecord) -> Result<(), DomainError> {
        self.emitted.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// An audit bus that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingAuditBus;

#[async_trait]
impl AuditBus for FailingAuditBus {
    async fn emit(&self, _record: &AuditRecord) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("audit bus unavailable".into()))
    }
}
