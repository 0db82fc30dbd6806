//! Shared test doubles and utilities for the Storefront event pipeline.

mod audit;
mod clock;
mod dead_letter;
mod event_store;
mod gateway;
mod ledger;
mod transaction_store;

pub use audit::{FailingAuditBus, RecordingAuditBus};
pub use clock::FixedClock;
pub use dead_letter::{FailingDeadLetterSink, RecordingDeadLetterSink};
pub use event_store::{FailingEventStore, InMemoryEventStore};
pub use gateway::{GatewayCall, RecordingChannelGateway};
pub use ledger::InMemoryNotificationLedger;
pub use transaction_store::InMemoryTransactionStore;
