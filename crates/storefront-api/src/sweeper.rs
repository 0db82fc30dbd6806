//! Background expiry sweeper.
//!
//! Feeds a `REMOVED` notification for every expired transaction through the
//! same delivery path as the change feed and deletes the rows only once that
//! delivery returned. A failed sweep leaves the rows for the next tick, and
//! the delivery ledger keeps the repeat from notifying a client twice. Each
//! sweep also purges expired event-history entries and old ledger keys.

use std::time::Duration;

use storefront_core::error::DomainError;
use storefront_pipeline::application::retry::DeliveryReport;
use storefront_pipeline::application::transaction_handlers::{
    expiry_notifications, find_expired_transactions, remove_expired_transactions,
};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::state::AppState;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Delivery of the expiry notifications.
    pub delivery: DeliveryReport,
    /// Expired transaction rows deleted after delivery.
    pub removed_transactions: u64,
    /// Event-history entries purged.
    pub purged_events: u64,
    /// Delivered-notification keys forgotten.
    pub purged_notifications: u64,
}

/// Runs one sweep.
///
/// # Errors
///
/// Propagates store errors and dead-letter sink failures. Expired rows are
/// kept when delivery fails.
#[instrument(skip(state))]
pub async fn sweep_once(state: &AppState) -> Result<SweepReport, DomainError> {
    let ports = &state.ports;
    let now = ports.clock.now();

    let expired = find_expired_transactions(now, ports.transaction_store.as_ref()).await?;
    let (delivery, removed_transactions) = if expired.is_empty() {
        (DeliveryReport::default(), 0)
    } else {
        let delivery = state.deliver(&expiry_notifications(&expired)).await?;
        let removed =
            remove_expired_transactions(&expired, now, ports.transaction_store.as_ref()).await?;
        (delivery, removed)
    };

    let purged_events = ports.event_store.purge_expired(now).await?;
    let purged_notifications = ports
        .ledger
        .purge_before(now - state.settings.ledger_retention)
        .await?;

    if removed_transactions > 0 || purged_events > 0 || purged_notifications > 0 {
        info!(
            expired = expired.len(),
            removed_transactions,
            dead_lettered = delivery.dead_lettered,
            purged_events,
            purged_notifications,
            "sweep finished"
        );
    }
    Ok(SweepReport {
        delivery,
        removed_transactions,
        purged_events,
        purged_notifications,
    })
}

/// Spawns the sweeper loop, ticking every `interval`.
pub fn spawn(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&state).await {
                error!(error = %err, "sweep failed");
            }
        }
    })
}
