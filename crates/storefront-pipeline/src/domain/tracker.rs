//! Transaction tracker decisions.

use uuid::Uuid;

use super::notification::{ChangeKind, TransactionImage};

/// What should happen to the client waiting on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do.
    None,
    /// The transaction expired while open: tell the client it timed out.
    NotifyTimeout,
}

/// Classifies a transaction change. A transaction that disappears while
/// still open has timed out; every other change needs no client action.
#[must_use]
pub fn observe_terminal_transition(change: ChangeKind, record: &TransactionImage) -> Decision {
    match change {
        ChangeKind::Removed if !record.status.is_terminal() => Decision::NotifyTimeout,
        ChangeKind::Created | ChangeKind::Updated | ChangeKind::Removed => Decision::None,
    }
}

/// Delivery-ledger key of the timeout notification for a transaction.
#[must_use]
pub fn timeout_notification_key(transaction_id: Uuid) -> String {
    format!("{transaction_id}#TIMEOUT")
}

#[cfg(test)]
mod tests {
    use storefront_core::channel::ConnectionHandle;
    use storefront_core::transaction::TransactionStatus;
    use uuid::Uuid;

    use super::*;

    fn image(status: TransactionStatus) -> TransactionImage {
        TransactionImage {
            pk: "#transaction".to_owned(),
            transaction_id: Uuid::new_v4(),
            channel_handle: ConnectionHandle::new("conn-1"),
            status,
            started_at: None,
            ttl: None,
        }
    }

    #[test]
    fn test_removed_while_pending_notifies_timeout() {
        assert_eq!(
            observe_terminal_transition(ChangeKind::Removed, &image(TransactionStatus::Pending)),
            Decision::NotifyTimeout
        );
    }

    #[test]
    fn test_removed_with_unrecognised_status_notifies_timeout() {
        assert_eq!(
            observe_terminal_transition(ChangeKind::Removed, &image(TransactionStatus::Unknown)),
            Decision::NotifyTimeout
        );
    }

    #[test]
    fn test_removed_after_terminal_status_needs_nothing() {
        for status in [
            TransactionStatus::Processed,
            TransactionStatus::Failed,
            TransactionStatus::Timeout,
        ] {
            assert_eq!(
                observe_terminal_transition(ChangeKind::Removed, &image(status)),
                Decision::None,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_creation_and_update_need_nothing() {
        let pending = image(TransactionStatus::Pending);

        assert_eq!(
            observe_terminal_transition(ChangeKind::Created, &pending),
            Decision::None
        );
        assert_eq!(
            observe_terminal_transition(ChangeKind::Updated, &pending),
            Decision::None
        );
    }

    #[test]
    fn test_timeout_key_is_per_transaction() {
        let id = Uuid::nil();

        assert_eq!(
            timeout_notification_key(id),
            "00000000-0000-0000-0000-000000000000#TIMEOUT"
        );
    }
}
