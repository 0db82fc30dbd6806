//! HTTP client for the socket gateway's connection-management API.
//!
//! Each live connection is addressed as `{base}/@connections/{handle}`:
//! `GET` checks it, `POST` sends the request body to it and `DELETE` closes
//! it. `404` and `410` mean the connection is gone.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use storefront_core::channel::{ChannelGateway, ConnectionHandle, GatewayError};
use storefront_core::error::DomainError;

/// Connection-management client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChannelGateway {
    client: Client,
    base_url: Url,
}

impl HttpChannelGateway {
    /// Creates a gateway client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, DomainError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DomainError::Validation(format!("invalid gateway url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DomainError::Validation(format!(
                "gateway url cannot be a base: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    fn connection_url(&self, handle: &ConnectionHandle) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Transport("gateway url cannot be a base".into()))?
            .pop_if_empty()
            .push("@connections")
            .push(handle.as_str());
        Ok(url)
    }

    async fn execute(
        &self,
        handle: &ConnectionHandle,
        request: reqwest::RequestBuilder,
    ) -> Result<(), GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(GatewayError::Gone(handle.clone())),
            status => Err(GatewayError::Transport(format!(
                "unexpected gateway status {status}"
            ))),
        }
    }
}

#[async_trait]
impl ChannelGateway for HttpChannelGateway {
    async fn verify(&self, handle: &ConnectionHandle) -> Result<(), GatewayError> {
        let url = self.connection_url(handle)?;
        self.execute(handle, self.client.get(url)).await
    }

    async fn push(&self, handle: &ConnectionHandle, data: &[u8]) -> Result<(), GatewayError> {
        let url = self.connection_url(handle)?;
        self.execute(handle, self.client.post(url).body(data.to_vec()))
            .await
    }

    async fn close(&self, handle: &ConnectionHandle) -> Result<(), GatewayError> {
        let url = self.connection_url(handle)?;
        self.execute(handle, self.client.delete(url)).await
    }
}
