//! Audit records emitted to the external audit bus.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Source tag of invoice audit records.
pub const INVOICE_AUDIT_SOURCE: &str = "app.invoice";

/// Detail type of invoice audit records.
pub const INVOICE_AUDIT_DETAIL_TYPE: &str = "invoice";

/// A structured event for the audit bus. Never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Producer of the record.
    pub source: String,
    /// Target bus.
    pub bus_name: String,
    /// Routing key on the bus.
    pub detail_type: String,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Free-form detail document.
    pub detail: serde_json::Value,
}

impl AuditRecord {
    /// Audit record for a transaction that expired while still open.
    #[must_use]
    pub fn transaction_timeout(bus_name: &str, transaction_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            source: INVOICE_AUDIT_SOURCE.to_owned(),
            bus_name: bus_name.to_owned(),
            detail_type: INVOICE_AUDIT_DETAIL_TYPE.to_owned(),
            timestamp: at,
            detail: serde_json::json!({
                "errorDetail": "TIMEOUT",
                "transactionId": transaction_id,
            }),
        }
    }
}

/// One-way emitter to the audit bus.
///
/// Delivery is at-least-once; receivers must tolerate duplicates.
/// Implementations surface failures instead of retrying them.
#[async_trait]
pub trait AuditBus: Send + Sync {
    /// Emits a single audit record.
    async fn emit(&self, record: &AuditRecord) -> Result<(), DomainError>;
}
