//! Terminal storage for batches that exhausted their retry budget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// A failed batch, kept verbatim for manual replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// Identifier of this dead-letter entry.
    pub id: Uuid,
    /// The records exactly as they were received.
    pub records: Vec<serde_json::Value>,
    /// Last error observed.
    pub error: String,
    /// Number of processing attempts made.
    pub attempts: u32,
    /// When the batch was given up on.
    pub failed_at: DateTime<Utc>,
}

/// Destination for dead-lettered batches.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Stores a dead-lettered batch.
    async fn send(&self, letter: &DeadLetter) -> Result<(), DomainError>;
}
