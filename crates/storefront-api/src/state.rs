//! Shared application state.

use std::sync::Arc;

use serde_json::Value;
use storefront_core::audit::AuditBus;
use storefront_core::channel::ChannelGateway;
use storefront_core::clock::Clock;
use storefront_core::dead_letter::DeadLetterSink;
use storefront_core::error::DomainError;
use storefront_core::ledger::NotificationLedger;
use storefront_core::repository::{EventStore, TransactionStore};
use storefront_pipeline::application::retry::{DeliveryReport, RetryPolicy, deliver_batch};
use storefront_pipeline::application::router::{FanOutRouter, RouterSettings};

/// Collaborators the pipeline talks to.
#[derive(Clone)]
pub struct Ports {
    /// Clock for timestamps.
    pub clock: Arc<dyn Clock>,
    /// Event history.
    pub event_store: Arc<dyn EventStore>,
    /// Transaction table.
    pub transaction_store: Arc<dyn TransactionStore>,
    /// Socket gateway for waiting clients.
    pub gateway: Arc<dyn ChannelGateway>,
    /// Audit event bus.
    pub audit_bus: Arc<dyn AuditBus>,
    /// Ledger of delivered notifications.
    pub ledger: Arc<dyn NotificationLedger>,
    /// Destination for dead-lettered batches.
    pub dead_letters: Arc<dyn DeadLetterSink>,
}

/// Tunables shared by every request.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Router settings.
    pub router: RouterSettings,
    /// Retry settings for delivered batches.
    pub retry: RetryPolicy,
    /// Lifetime of an open transaction.
    pub transaction_ttl: chrono::Duration,
    /// How long delivered-notification keys are kept.
    pub ledger_retention: chrono::Duration,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline collaborators.
    pub ports: Ports,
    /// Pipeline tunables.
    pub settings: Arc<PipelineSettings>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(ports: Ports, settings: PipelineSettings) -> Self {
        Self {
            ports,
            settings: Arc::new(settings),
        }
    }

    /// Builds a fan-out router borrowing this state's collaborators.
    #[must_use]
    pub fn fan_out_router(&self) -> FanOutRouter<'_> {
        FanOutRouter::new(
            self.ports.event_store.as_ref(),
            self.ports.gateway.as_ref(),
            self.ports.audit_bus.as_ref(),
            self.ports.ledger.as_ref(),
            self.ports.clock.as_ref(),
            &self.settings.router,
        )
    }

    /// Delivers raw change notifications through the fan-out router under
    /// the configured retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error only if a dead-lettered chunk could not be stored.
    pub async fn deliver(&self, records: &[Value]) -> Result<DeliveryReport, DomainError> {
        deliver_batch(
            records,
            &self.settings.retry,
            &self.fan_out_router(),
            self.ports.dead_letters.as_ref(),
            self.ports.clock.as_ref(),
        )
        .await
    }
}
