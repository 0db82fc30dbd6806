//! Async transaction records.
//!
//! A transaction is opened when a client starts a long-running operation
//! (e.g. a bulk invoice import) and is correlated with the live connection
//! the client is waiting on. It ends when a worker completes it or when the
//! store expires it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ConnectionHandle;
use crate::error::DomainError;

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Waiting for the worker.
    #[serde(alias = "URL_SENT", alias = "INVOICE_RECEIVED")]
    Pending,
    /// The worker finished successfully.
    #[serde(alias = "INVOICE_PROCESSED")]
    Processed,
    /// The transaction expired before the worker finished.
    Timeout,
    /// The worker gave up.
    Failed,
    /// A status written by a newer producer. Treated as non-terminal.
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Timeout | Self::Failed)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processed => "PROCESSED",
            Self::Timeout => "TIMEOUT",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" | "URL_SENT" | "INVOICE_RECEIVED" => Ok(Self::Pending),
            "PROCESSED" | "INVOICE_PROCESSED" => Ok(Self::Processed),
            "TIMEOUT" => Ok(Self::Timeout),
            "FAILED" => Ok(Self::Failed),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(DomainError::Validation(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// A tracked async transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Correlation identifier.
    pub transaction_id: Uuid,
    /// Connection of the client waiting on the outcome. May already be stale.
    pub channel_handle: ConnectionHandle,
    /// Current status.
    pub status: TransactionStatus,
    /// When the transaction was opened.
    pub started_at: DateTime<Utc>,
    /// When the store will expire the record.
    pub expires_at: DateTime<Utc>,
}

impl Transaction {
    /// Opens a new pending transaction.
    #[must_use]
    pub fn begin(
        transaction_id: Uuid,
        channel_handle: ConnectionHandle,
        started_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            transaction_id,
            channel_handle,
            status: TransactionStatus::Pending,
            started_at,
            expires_at: started_at + ttl,
        }
    }

    /// Returns a copy moved to `to`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the transaction is already
    /// terminal or `to` is not a terminal status.
    pub fn transition(&self, to: TransactionStatus) -> Result<Self, DomainError> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(DomainError::InvalidTransition {
                transaction_id: self.transaction_id,
                from: self.status,
                to,
            });
        }
        Ok(Self {
            status: to,
            ..self.clone()
        })
    }
}
