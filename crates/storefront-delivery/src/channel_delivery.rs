//! Verify-then-act delivery to live connections.

use serde::Serialize;
use storefront_core::channel::{ChannelGateway, ConnectionHandle};
use storefront_core::transaction::TransactionStatus;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Status message pushed to a client waiting on a transaction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    /// The transaction the status belongs to.
    pub transaction_id: Uuid,
    /// The status reached.
    pub status: TransactionStatus,
}

/// Sends to and disconnects live connections through a gateway.
///
/// Both operations check the connection first. A stale handle is an
/// expected outcome: it is logged and reported as `false`, never raised.
#[derive(Clone, Copy)]
pub struct ChannelDelivery<'a> {
    gateway: &'a dyn ChannelGateway,
}

impl<'a> ChannelDelivery<'a> {
    /// Creates a delivery adapter over `gateway`.
    #[must_use]
    pub fn new(gateway: &'a dyn ChannelGateway) -> Self {
        Self { gateway }
    }

    /// Pushes `payload` to `handle`. Returns whether it was delivered.
    #[instrument(skip(self, payload), fields(handle = %handle))]
    pub async fn send(&self, handle: &ConnectionHandle, payload: &[u8]) -> bool {
        if let Err(err) = self.gateway.verify(handle).await {
            warn!(error = %err, "connection is not live; message dropped");
            return false;
        }
        match self.gateway.push(handle, payload).await {
            Ok(()) => {
                debug!(bytes = payload.len(), "message delivered");
                true
            }
            Err(err) => {
                warn!(error = %err, "push to connection failed");
                false
            }
        }
    }

    /// Pushes a `{transactionId, status}` message to `handle`.
    pub async fn send_status(
        &self,
        handle: &ConnectionHandle,
        transaction_id: Uuid,
        status: TransactionStatus,
    ) -> bool {
        let message = StatusMessage {
            transaction_id,
            status,
        };
        match serde_json::to_vec(&message) {
            Ok(body) => self.send(handle, &body).await,
            Err(err) => {
                warn!(error = %err, "status message could not be encoded");
                false
            }
        }
    }

    /// Closes `handle`. Returns `false` if it was already gone.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn disconnect(&self, handle: &ConnectionHandle) -> bool {
        if let Err(err) = self.gateway.verify(handle).await {
            warn!(error = %err, "connection is not live; nothing to close");
            return false;
        }
        match self.gateway.close(handle).await {
            Ok(()) => {
                debug!("connection closed");
                true
            }
            Err(err) => {
                warn!(error = %err, "closing connection failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use storefront_core::channel::ConnectionHandle;
    use storefront_core::transaction::TransactionStatus;
    use storefront_test_support::{GatewayCall, RecordingChannelGateway};
    use uuid::Uuid;

    use super::ChannelDelivery;

    #[tokio::test]
    async fn test_send_to_live_handle_verifies_then_pushes() {
        // Arrange
        let gateway = RecordingChannelGateway::with_live(&["conn-1"]);
        let delivery = ChannelDelivery::new(&gateway);
        let handle = ConnectionHandle::new("conn-1");

        // Act
        let delivered = delivery.send(&handle, b"hello").await;

        // Assert
        assert!(delivered);
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::Verify(handle.clone()),
                GatewayCall::Push(handle, "hello".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_to_unknown_handle_returns_false_without_push() {
        // Arrange
        let gateway = RecordingChannelGateway::with_live(&[]);
        let delivery = ChannelDelivery::new(&gateway);

        // Act
        let delivered = delivery.send(&ConnectionHandle::new("gone"), b"hello").await;

        // Assert
        assert!(!delivered);
        assert!(gateway.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_send_when_gateway_unreachable_returns_false() {
        let gateway = RecordingChannelGateway::unreachable();
        let delivery = ChannelDelivery::new(&gateway);

        let delivered = delivery.send(&ConnectionHandle::new("conn-1"), b"x").await;

        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_send_status_pushes_json_message() {
        // Arrange
        let gateway = RecordingChannelGateway::with_live(&["conn-1"]);
        let delivery = ChannelDelivery::new(&gateway);
        let transaction_id = Uuid::new_v4();

        // Act
        let delivered = delivery
            .send_status(
                &ConnectionHandle::new("conn-1"),
                transaction_id,
                TransactionStatus::Timeout,
            )
            .await;

        // Assert
        assert!(delivered);
        let pushes = gateway.pushes();
        assert_eq!(pushes.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&pushes[0].1).unwrap();
        assert_eq!(body["transactionId"], transaction_id.to_string());
        assert_eq!(body["status"], "TIMEOUT");
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        // Arrange
        let gateway = RecordingChannelGateway::with_live(&["conn-1"]);
        let delivery = ChannelDelivery::new(&gateway);
        let handle = ConnectionHandle::new("conn-1");

        // Act
        let first = delivery.disconnect(&handle).await;
        let second = delivery.disconnect(&handle).await;

        // Assert
        assert!(first);
        assert!(!second);
        assert!(!gateway.is_live("conn-1"));
        assert_eq!(gateway.closes(), vec![handle]);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_handle_returns_false() {
        let gateway = RecordingChannelGateway::with_live(&["conn-1"]);
        let delivery = ChannelDelivery::new(&gateway);

        let closed = delivery.disconnect(&ConnectionHandle::new("other")).await;

        assert!(!closed);
        assert!(gateway.closes().is_empty());
        assert!(gateway.is_live("conn-1"));
    }
}
