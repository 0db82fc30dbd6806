//! Live client connections and the gateway that manages them.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier of a live bidirectional connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(String);

impl ConnectionHandle {
    /// Wraps a gateway-issued connection id.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Returns the raw connection id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by a connection gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The connection is closed or was never registered.
    #[error("connection {0} is gone")]
    Gone(ConnectionHandle),

    /// The gateway could not be reached or answered unexpectedly.
    #[error("gateway request failed: {0}")]
    Transport(String),
}

/// Connection-management operations of the socket gateway.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Checks that the connection is still live.
    async fn verify(&self, handle: &ConnectionHandle) -> Result<(), GatewayError>;

    /// Posts a message to the connection.
    async fn push(&self, handle: &ConnectionHandle, data: &[u8]) -> Result<(), GatewayError>;

    /// Closes the connection.
    async fn close(&self, handle: &ConnectionHandle) -> Result<(), GatewayError>;
}
