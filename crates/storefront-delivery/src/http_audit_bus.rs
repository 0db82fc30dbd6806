//! HTTP emitter for the audit event bus.
//!
//! Records are sent as a single-entry `PutEvents` request. A non-success
//! status or a non-zero `FailedEntryCount` is reported as an infrastructure
//! error so the batch is retried by the caller's retry policy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storefront_core::audit::{AuditBus, AuditRecord};
use storefront_core::error::DomainError;
use tracing::{debug, instrument, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutEventsEntry<'a> {
    source: &'a str,
    event_bus_name: &'a str,
    detail_type: &'a str,
    time: String,
    detail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutEventsRequest<'a> {
    entries: Vec<PutEventsEntry<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PutEventsResponse {
    failed_entry_count: u32,
}

/// Audit bus reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuditBus {
    client: Client,
    endpoint: String,
}

impl HttpAuditBus {
    /// Creates an emitter posting to `endpoint`.
    #[must_use]
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AuditBus for HttpAuditBus {
    #[instrument(skip(self, record), fields(bus = %record.bus_name, detail_type = %record.detail_type))]
    async fn emit(&self, record: &AuditRecord) -> Result<(), DomainError> {
        let request = PutEventsRequest {
            entries: vec![PutEventsEntry {
                source: &record.source,
                event_bus_name: &record.bus_name,
                detail_type: &record.detail_type,
                time: record.timestamp.to_rfc3339(),
                detail: record.detail.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::Infrastructure(format!("audit bus unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Infrastructure(format!(
                "audit bus rejected record with status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::Infrastructure(format!("audit bus response: {e}")))?;
        if !body.is_empty() {
            let parsed = match serde_json::from_slice::<PutEventsResponse>(&body) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(%status, error = %err, "unreadable audit bus response; assuming accepted");
                    PutEventsResponse::default()
                }
            };
            if parsed.failed_entry_count > 0 {
                return Err(DomainError::Infrastructure(format!(
                    "audit bus failed {} entries",
                    parsed.failed_entry_count
                )));
            }
        }

        debug!("audit record emitted");
        Ok(())
    }
}
