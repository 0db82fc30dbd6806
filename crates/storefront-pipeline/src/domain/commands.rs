//! Commands for the transaction lifecycle.

use storefront_core::channel::ConnectionHandle;
use storefront_core::command::Command;
use storefront_core::transaction::TransactionStatus;
use uuid::Uuid;

/// Command to open a transaction for a waiting client.
#[derive(Debug, Clone)]
pub struct BeginTransaction {
    /// The correlation ID; becomes the transaction id.
    pub correlation_id: Uuid,
    /// The connection the client is waiting on.
    pub channel_handle: ConnectionHandle,
}

impl Command for BeginTransaction {
    fn command_type(&self) -> &'static str {
        "transactions.begin"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to move a pending transaction to a terminal status.
#[derive(Debug, Clone)]
pub struct CompleteTransaction {
    /// The transaction to complete.
    pub transaction_id: Uuid,
    /// The terminal status reached.
    pub status: TransactionStatus,
}

impl Command for CompleteTransaction {
    fn command_type(&self) -> &'static str {
        "transactions.complete"
    }

    fn correlation_id(&self) -> Uuid {
        self.transaction_id
    }
}
