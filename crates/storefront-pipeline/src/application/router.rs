//! Fan-out router: turns change notifications into side effects.
//!
//! Records of a batch are handled concurrently; the batch only succeeds if
//! every record does. Upstream delivery is at-least-once, so every effect
//! here is safe to repeat: event appends overwrite by key and timeout
//! notifications are recorded in the delivery ledger once fully delivered.

use std::collections::HashSet;

use chrono::Duration;
use futures::future::{join, join_all};
use serde_json::Value;
use storefront_core::audit::{AuditBus, AuditRecord};
use storefront_core::channel::ChannelGateway;
use storefront_core::clock::Clock;
use storefront_core::error::DomainError;
use storefront_core::event::{DomainEvent, EntityCreated, EntityKind};
use storefront_core::ledger::NotificationLedger;
use storefront_core::repository::EventStore;
use storefront_core::transaction::TransactionStatus;
use storefront_delivery::channel_delivery::ChannelDelivery;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::notification::{
    ChangeKind, ChangeNotification, InvoiceImage, OrderImage, SourceRecord, TransactionImage,
    owner_of,
};
use crate::domain::tracker::{Decision, observe_terminal_transition, timeout_notification_key};

/// Default lifetime of event-history entries.
pub const DEFAULT_EVENT_TTL_SECS: i64 = 3600;

/// Router settings.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Lifetime of appended event-history entries.
    pub event_ttl: Duration,
    /// Audit bus that timeout records are addressed to.
    pub audit_bus_name: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            event_ttl: Duration::seconds(DEFAULT_EVENT_TTL_SECS),
            audit_bus_name: "audit".to_owned(),
        }
    }
}

/// Why a notification produced no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A transaction row was written; the worker owns it from here.
    TransactionWritten,
    /// A transaction row was removed after reaching a terminal status.
    TransactionSettled,
    /// Updates are not propagated.
    Updated,
    /// A primary entity row was removed.
    EntityRemoved,
    /// The row kind is not routed.
    UnknownRecord,
}

/// Side effects produced for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An event-history entry was appended.
    EventAppended {
        /// Subject of the entry.
        subject_key: String,
        /// Sort key of the entry.
        sort_key: String,
    },
    /// A timed-out transaction was audited and its client notified.
    TimeoutNotified {
        /// The expired transaction.
        transaction_id: Uuid,
        /// Whether the status reached the client.
        pushed: bool,
        /// Whether the connection was closed.
        closed: bool,
    },
    /// The timeout for this transaction was already delivered.
    AlreadyNotified {
        /// The expired transaction.
        transaction_id: Uuid,
    },
    /// Nothing to do.
    Ignored(IgnoreReason),
}

/// Dispatches change notifications to the event store, the delivery
/// channel, and the audit bus.
#[derive(Clone, Copy)]
pub struct FanOutRouter<'a> {
    event_store: &'a dyn EventStore,
    gateway: &'a dyn ChannelGateway,
    audit_bus: &'a dyn AuditBus,
    ledger: &'a dyn NotificationLedger,
    clock: &'a dyn Clock,
    settings: &'a RouterSettings,
}

impl<'a> FanOutRouter<'a> {
    /// Creates a router over the given collaborators.
    #[must_use]
    pub fn new(
        event_store: &'a dyn EventStore,
        gateway: &'a dyn ChannelGateway,
        audit_bus: &'a dyn AuditBus,
        ledger: &'a dyn NotificationLedger,
        clock: &'a dyn Clock,
        settings: &'a RouterSettings,
    ) -> Self {
        Self {
            event_store,
            gateway,
            audit_bus,
            ledger,
            clock,
            settings,
        }
    }

    /// Handles every record of a batch concurrently.
    ///
    /// Repeated copies of one timeout run after the first copy finished, so
    /// the delivery ledger suppresses them.
    ///
    /// # Errors
    ///
    /// Returns the first failure in record order once all records have
    /// finished. Records that succeeded are not rolled back.
    #[instrument(skip(self, records), fields(batch_size = records.len()))]
    pub async fn handle_batch(&self, records: &[Value]) -> Result<Vec<RouteOutcome>, DomainError> {
        let mut seen = HashSet::new();
        let (first, repeats): (Vec<usize>, Vec<usize>) = (0..records.len())
            .partition(|&index| timeout_key_of(&records[index]).is_none_or(|key| seen.insert(key)));

        let mut results: Vec<Option<Result<RouteOutcome, DomainError>>> =
            records.iter().map(|_| None).collect();
        let concurrent = join_all(first.iter().map(|&index| async move {
            (index, self.handle_record(&records[index]).await)
        }))
        .await;
        for (index, result) in concurrent {
            results[index] = Some(result);
        }
        for index in repeats {
            debug!(index, "repeated timeout handled after its first copy");
            results[index] = Some(self.handle_record(&records[index]).await);
        }

        let mut outcomes = Vec::with_capacity(records.len());
        let mut first_error = None;
        for (index, result) in results.into_iter().flatten().enumerate() {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(index, error = %err, "change notification failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    /// Decodes and routes one raw change notification.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Malformed` for undecodable notifications and
    /// propagates event store and audit bus failures.
    pub async fn handle_record(&self, raw: &Value) -> Result<RouteOutcome, DomainError> {
        let notification = ChangeNotification::decode(raw)?;
        self.route(&notification).await
    }

    /// Routes a decoded notification.
    ///
    /// # Errors
    ///
    /// Propagates event store and audit bus failures.
    #[instrument(skip(self, notification), fields(
        change_kind = ?notification.change_kind,
        event_id = notification.event_id.as_deref().unwrap_or("-"),
    ))]
    pub async fn route(&self, notification: &ChangeNotification) -> Result<RouteOutcome, DomainError> {
        match (notification.change_kind, &notification.before, &notification.after) {
            (ChangeKind::Created, _, Some(SourceRecord::Invoice(invoice))) => {
                self.append_invoice_created(invoice, notification).await
            }
            (ChangeKind::Created, _, Some(SourceRecord::Order(order))) => {
                self.append_order_created(order, notification).await
            }
            (ChangeKind::Created, _, Some(SourceRecord::Transaction(transaction))) => {
                info!(transaction_id = %transaction.transaction_id, "transaction opened");
                Ok(RouteOutcome::Ignored(IgnoreReason::TransactionWritten))
            }
            (ChangeKind::Removed, Some(SourceRecord::Transaction(transaction)), _) => {
                match observe_terminal_transition(ChangeKind::Removed, transaction) {
                    Decision::NotifyTimeout => self.notify_timeout(transaction).await,
                    Decision::None => {
                        info!(
                            transaction_id = %transaction.transaction_id,
                            status = %transaction.status,
                            "transaction removed after completion"
                        );
                        Ok(RouteOutcome::Ignored(IgnoreReason::TransactionSettled))
                    }
                }
            }
            (ChangeKind::Removed, Some(SourceRecord::Invoice(_) | SourceRecord::Order(_)), _) => {
                Ok(RouteOutcome::Ignored(IgnoreReason::EntityRemoved))
            }
            (ChangeKind::Updated, _, _) => {
                // Status changes are not propagated yet.
                debug!(unhandled = true, "update notification ignored");
                Ok(RouteOutcome::Ignored(IgnoreReason::Updated))
            }
            _ => {
                warn!("change notification for an unrouted record kind ignored");
                Ok(RouteOutcome::Ignored(IgnoreReason::UnknownRecord))
            }
        }
    }

    async fn append_invoice_created(
        &self,
        invoice: &InvoiceImage,
        notification: &ChangeNotification,
    ) -> Result<RouteOutcome, DomainError> {
        let owner = owner_of(&invoice.pk)?;
        let created = EntityCreated {
            entity: EntityKind::Invoice,
            owner: owner.to_owned(),
            entity_id: invoice.sk.clone(),
            owner_email: invoice.email.clone().unwrap_or_else(|| owner.to_owned()),
            correlation_id: invoice.transaction_id,
            payload: serde_json::json!({
                "transactionId": invoice.transaction_id,
                "productId": invoice.product_id,
                "quantity": invoice.quantity,
            }),
        };
        self.append(created, notification).await
    }

    async fn append_order_created(
        &self,
        order: &OrderImage,
        notification: &ChangeNotification,
    ) -> Result<RouteOutcome, DomainError> {
        let owner = owner_of(&order.pk)?;
        let created = EntityCreated {
            entity: EntityKind::Order,
            owner: owner.to_owned(),
            entity_id: order.sk.clone(),
            owner_email: order.email.clone().unwrap_or_else(|| owner.to_owned()),
            correlation_id: order.request_id,
            payload: serde_json::json!({
                "orderId": order.sk,
                "productCodes": order.product_codes,
            }),
        };
        self.append(created, notification).await
    }

    async fn append(
        &self,
        created: EntityCreated,
        notification: &ChangeNotification,
    ) -> Result<RouteOutcome, DomainError> {
        let event = DomainEvent::entity_created(
            created,
            notification.captured_at,
            self.settings.event_ttl,
        );
        self.event_store.append(&event).await?;
        info!(
            subject_key = %event.subject_key,
            sort_key = %event.sort_key,
            "event history entry appended"
        );
        Ok(RouteOutcome::EventAppended {
            subject_key: event.subject_key,
            sort_key: event.sort_key,
        })
    }

    async fn notify_timeout(&self, transaction: &TransactionImage) -> Result<RouteOutcome, DomainError> {
        let transaction_id = transaction.transaction_id;
        let key = timeout_notification_key(transaction_id);
        if self.ledger.is_recorded(&key).await? {
            info!(%transaction_id, "timeout already delivered");
            return Ok(RouteOutcome::AlreadyNotified { transaction_id });
        }

        warn!(
            %transaction_id,
            status = %transaction.status,
            handle = %transaction.channel_handle,
            "transaction expired while open"
        );

        let now = self.clock.now();
        let audit = AuditRecord::transaction_timeout(&self.settings.audit_bus_name, transaction_id, now);
        let delivery = ChannelDelivery::new(self.gateway);

        let (emitted, pushed) = join(
            self.audit_bus.emit(&audit),
            delivery.send_status(
                &transaction.channel_handle,
                transaction_id,
                TransactionStatus::Timeout,
            ),
        )
        .await;
        emitted?;

        let closed = delivery.disconnect(&transaction.channel_handle).await;

        self.ledger.record(&key, now).await?;

        Ok(RouteOutcome::TimeoutNotified {
            transaction_id,
            pushed,
            closed,
        })
    }
}

/// Ledger key of the timeout a raw record would trigger, if any.
fn timeout_key_of(raw: &Value) -> Option<String> {
    let notification = ChangeNotification::decode(raw).ok()?;
    match (notification.change_kind, notification.before) {
        (ChangeKind::Removed, Some(SourceRecord::Transaction(transaction))) => {
            Some(timeout_notification_key(transaction.transaction_id))
        }
        _ => None,
    }
}
