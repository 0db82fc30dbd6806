//! Route modules.

pub mod changes;
pub mod events;
pub mod health;
pub mod transactions;

use axum::Router;

use crate::state::AppState;

/// Returns every route of the service, without middleware.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/changes", changes::router())
        .nest("/api/v1/events", events::router())
        .nest("/api/v1/transactions", transactions::router())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use storefront_core::event::DomainEvent;
    use storefront_core::transaction::Transaction;
    use storefront_pipeline::application::retry::RetryPolicy;
    use storefront_pipeline::application::router::RouterSettings;
    use storefront_test_support::{
        FixedClock, InMemoryEventStore, InMemoryNotificationLedger, InMemoryTransactionStore,
        RecordingAuditBus, RecordingChannelGateway, RecordingDeadLetterSink,
    };

    use crate::state::{AppState, PipelineSettings, Ports};

    pub(crate) fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    /// In-memory state with handles on every double.
    pub(crate) struct Fixture {
        pub events: Arc<InMemoryEventStore>,
        pub transactions: Arc<InMemoryTransactionStore>,
        pub gateway: Arc<RecordingChannelGateway>,
        pub audit: Arc<RecordingAuditBus>,
        pub dead_letters: Arc<RecordingDeadLetterSink>,
        pub state: AppState,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            Self::seeded(Vec::new(), Vec::new())
        }

        pub(crate) fn seeded(events: Vec<DomainEvent>, transactions: Vec<Transaction>) -> Self {
            let events = Arc::new(InMemoryEventStore::with_events(events));
            let transactions = Arc::new(InMemoryTransactionStore::with_transactions(transactions));
            let gateway = Arc::new(RecordingChannelGateway::with_live(&["conn-1"]));
            let audit = Arc::new(RecordingAuditBus::new());
            let dead_letters = Arc::new(RecordingDeadLetterSink::new());
            let state = AppState::new(
                Ports {
                    clock: Arc::new(FixedClock(fixed_now())),
                    event_store: events.clone(),
                    transaction_store: transactions.clone(),
                    gateway: gateway.clone(),
                    audit_bus: audit.clone(),
                    ledger: Arc::new(InMemoryNotificationLedger::new()),
                    dead_letters: dead_letters.clone(),
                },
                PipelineSettings {
                    router: RouterSettings::default(),
                    retry: RetryPolicy {
                        base_backoff: std::time::Duration::from_millis(1),
                        ..RetryPolicy::default()
                    },
                    transaction_ttl: chrono::Duration::seconds(120),
                    ledger_retention: chrono::Duration::seconds(86_400),
                },
            );
            Self {
                events,
                transactions,
                gateway,
                audit,
                dead_letters,
                state,
            }
        }
    }
}
