//! Test gateway — a `ChannelGateway` with an in-memory set of live handles.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use storefront_core::channel::{ChannelGateway, ConnectionHandle, GatewayError};

/// A gateway call as observed by [`RecordingChannelGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `verify(handle)`.
    Verify(ConnectionHandle),
    /// `push(handle, data)` with the data decoded as UTF-8.
    Push(ConnectionHandle, String),
    /// `close(handle)`.
    Close(ConnectionHandle),
}

/// A gateway that knows a set of live connections and records every call.
///
/// Calls for handles outside the live set fail with `GatewayError::Gone`.
/// Closing a handle removes it from the set.
#[derive(Debug, Default)]
pub struct RecordingChannelGateway {
    live: Mutex<HashSet<ConnectionHandle>>,
    calls: Mutex<Vec<GatewayCall>>,
    unreachable: bool,
}

impl RecordingChannelGateway {
    /// Create a gateway with the given live connections.
    #[must_use]
    pub fn with_live(handles: &[&str]) -> Self {
        Self {
            live: Mutex::new(handles.iter().map(|h| ConnectionHandle::new(*h)).collect()),
            calls: Mutex::new(Vec::new()),
            unreachable: false,
        }
    }

    /// Create a gateway that fails every call with a transport error.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Returns a snapshot of every call made.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the payloads pushed, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn pushes(&self) -> Vec<(ConnectionHandle, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Push(handle, data) => Some((handle.clone(), data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Returns the handles closed, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn closes(&self) -> Vec<ConnectionHandle> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Close(handle) => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether `handle` is still live.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_live(&self, handle: &str) -> bool {
        self.live
            .lock()
            .unwrap()
            .contains(&ConnectionHandle::new(handle))
    }

    fn check(&self, handle: &ConnectionHandle) -> Result<(), GatewayError> {
        if self.unreachable {
            return Err(GatewayError::Transport("gateway unreachable".into()));
        }
        if self.live.lock().unwrap().contains(handle) {
            Ok(())
        } else {
            Err(GatewayError::Gone(handle.clone()))
        }
    }
}

#[async_trait]
impl ChannelGateway for RecordingChannelGateway {
    async fn verify(&self, handle: &ConnectionHandle) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Verify(handle.clone()));
        self.check(handle)
    }

    async fn push(&self, handle: &ConnectionHandle, data: &[u8]) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(GatewayCall::Push(
            handle.clone(),
            String::from_utf8_lossy(data).into_owned(),
        ));
        self.check(handle)
    }

    async fn close(&self, handle: &ConnectionHandle) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(GatewayCall::Close(handle.clone()));
        self.check(handle)?;
        self.live.lock().unwrap().remove(handle);
        Ok(())
    }
}
