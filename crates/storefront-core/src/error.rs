//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::transaction::TransactionStatus;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller supplied an invalid value.
    #[error("validation error: {0}")]
    Validation(String),

    /// A change notification could not be decoded. Such records fail on
    /// every attempt and end up in the dead-letter sink.
    #[error("malformed change notification: {0}")]
    Malformed(String),

    /// A transaction status change that would leave a terminal state.
    #[error("transaction {transaction_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The transaction being updated.
        transaction_id: Uuid,
        /// The status currently held.
        from: TransactionStatus,
        /// The requested status.
        to: TransactionStatus,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
