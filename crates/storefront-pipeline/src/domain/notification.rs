//! Change notifications from the source tables.
//!
//! A notification arrives as raw JSON and is decoded at this boundary into
//! a [`ChangeNotification`] whose images are typed [`SourceRecord`]s. Each
//! image carries an explicit `recordKind` tag written by its producer, so
//! routing is a plain `match` on the decoded variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_core::channel::ConnectionHandle;
use storefront_core::error::DomainError;
use storefront_core::event::EntityKind;
use storefront_core::transaction::{Transaction, TransactionStatus};
use uuid::Uuid;

/// Partition key shared by every transaction row.
pub const TRANSACTION_PARTITION_KEY: &str = "#transaction";

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// A row was inserted.
    #[serde(alias = "INSERT")]
    Created,
    /// A row was modified.
    #[serde(alias = "MODIFY")]
    Updated,
    /// A row was deleted, explicitly or by expiry.
    #[serde(alias = "REMOVE")]
    Removed,
}

/// Explicit kind tag carried by every source row image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// An async transaction row.
    Transaction,
    /// An invoice row.
    Invoice,
    /// An order row.
    Order,
    /// A tag this build does not route.
    #[serde(other)]
    Unknown,
}

impl RecordKind {
    /// Kind of an image written before rows were tagged. Only transaction
    /// rows can be recognised, by their fixed partition key.
    #[must_use]
    pub fn infer_untagged(partition_key: &str) -> Self {
        if partition_key.starts_with(TRANSACTION_PARTITION_KEY) {
            Self::Transaction
        } else {
            Self::Unknown
        }
    }
}

/// Wire envelope of one change notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    event_id: Option<String>,
    change_kind: ChangeKind,
    captured_at: DateTime<Utc>,
    #[serde(default)]
    sequence_number: Option<String>,
    #[serde(default)]
    before_image: Option<Value>,
    #[serde(default)]
    after_image: Option<Value>,
}

/// Image of a transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionImage {
    /// Always [`TRANSACTION_PARTITION_KEY`].
    pub pk: String,
    /// The transaction id.
    #[serde(rename = "sk")]
    pub transaction_id: Uuid,
    /// Connection of the waiting client.
    #[serde(rename = "connectionId")]
    pub channel_handle: ConnectionHandle,
    /// Status at the time of the image.
    #[serde(rename = "transactionStatus")]
    pub status: TransactionStatus,
    /// When the transaction was opened.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Expiry in epoch seconds.
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl From<&Transaction> for TransactionImage {
    fn from(transaction: &Transaction) -> Self {
        Self {
            pk: TRANSACTION_PARTITION_KEY.to_owned(),
            transaction_id: transaction.transaction_id,
            channel_handle: transaction.channel_handle.clone(),
            status: transaction.status,
            started_at: Some(transaction.started_at),
            ttl: Some(transaction.expires_at.timestamp()),
        }
    }
}

/// Image of an invoice row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceImage {
    /// `{prefix}_{owner}`.
    pub pk: String,
    /// Invoice number.
    pub sk: String,
    /// Owner contact address. Defaults to the owner segment of `pk`.
    #[serde(default)]
    pub email: Option<String>,
    /// Import transaction the invoice arrived with.
    #[serde(default)]
    pub transaction_id: Option<Uuid>,
    /// Invoiced product.
    pub product_id: String,
    /// Invoiced quantity.
    pub quantity: i64,
}

/// Image of an order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderImage {
    /// `{prefix}_{owner}`.
    pub pk: String,
    /// Order id.
    pub sk: String,
    /// Owner contact address. Defaults to the owner segment of `pk`.
    #[serde(default)]
    pub email: Option<String>,
    /// API request that created the order.
    #[serde(default)]
    pub request_id: Option<Uuid>,
    /// Ordered product codes.
    #[serde(default)]
    pub product_codes: Vec<String>,
}

/// A decoded source row image.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    /// A transaction row.
    Transaction(TransactionImage),
    /// An invoice row.
    Invoice(InvoiceImage),
    /// An order row.
    Order(OrderImage),
    /// A row of a kind this build does not route.
    Unknown,
}

impl SourceRecord {
    /// Decodes a raw image, using its `recordKind` tag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Malformed` if the image is not an object or is
    /// missing fields its kind requires.
    pub fn decode(image: &Value) -> Result<Self, DomainError> {
        let object = image
            .as_object()
            .ok_or_else(|| DomainError::Malformed("image is not an object".into()))?;

        let kind = match object.get("recordKind") {
            Some(tag) => serde_json::from_value::<RecordKind>(tag.clone())
                .map_err(|e| DomainError::Malformed(format!("invalid recordKind: {e}")))?,
            None => object
                .get("pk")
                .and_then(Value::as_str)
                .map_or(RecordKind::Unknown, RecordKind::infer_untagged),
        };

        let decoded = match kind {
            RecordKind::Transaction => Self::Transaction(decode_image(image, "transaction")?),
            RecordKind::Invoice => Self::Invoice(decode_image(image, "invoice")?),
            RecordKind::Order => Self::Order(decode_image(image, "order")?),
            RecordKind::Unknown => Self::Unknown,
        };
        Ok(decoded)
    }

    /// The entity kind recorded in the event history, if any.
    #[must_use]
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            Self::Invoice(_) => Some(EntityKind::Invoice),
            Self::Order(_) => Some(EntityKind::Order),
            Self::Transaction(_) | Self::Unknown => None,
        }
    }
}

fn decode_image<T: serde::de::DeserializeOwned>(image: &Value, kind: &str) -> Result<T, DomainError> {
    serde_json::from_value(image.clone())
        .map_err(|e| DomainError::Malformed(format!("invalid {kind} image: {e}")))
}

/// Owner segment of a partition key: everything after the first `_`.
///
/// # Errors
///
/// Returns `DomainError::Malformed` if the key has no non-empty owner.
pub fn owner_of(partition_key: &str) -> Result<&str, DomainError> {
    match partition_key.split_once('_') {
        Some((_, owner)) if !owner.is_empty() => Ok(owner),
        _ => Err(DomainError::Malformed(format!(
            "partition key {partition_key:?} has no owner segment"
        ))),
    }
}

/// A decoded change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    /// Identifier assigned by the change stream.
    pub event_id: Option<String>,
    /// Kind of change.
    pub change_kind: ChangeKind,
    /// When the change stream captured the change.
    pub captured_at: DateTime<Utc>,
    /// Position within the partition, if provided.
    pub sequence_number: Option<String>,
    /// Row before the change. Present for updates and removals.
    pub before: Option<SourceRecord>,
    /// Row after the change. Present for creations and updates.
    pub after: Option<SourceRecord>,
}

impl ChangeNotification {
    /// Decodes a raw notification.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Malformed` if the envelope or an image cannot
    /// be decoded, or if the image required by the change kind is missing.
    pub fn decode(raw: &Value) -> Result<Self, DomainError> {
        let envelope: Envelope = serde_json::from_value(raw.clone())
            .map_err(|e| DomainError::Malformed(format!("invalid envelope: {e}")))?;

        let before = envelope.before_image.as_ref().map(SourceRecord::decode).transpose()?;
        let after = envelope.after_image.as_ref().map(SourceRecord::decode).transpose()?;

        match envelope.change_kind {
            ChangeKind::Created if after.is_none() => {
                return Err(DomainError::Malformed("CREATED without afterImage".into()));
            }
            ChangeKind::Removed if before.is_none() => {
                return Err(DomainError::Malformed("REMOVED without beforeImage".into()));
            }
            _ => {}
        }

        Ok(Self {
            event_id: envelope.event_id,
            change_kind: envelope.change_kind,
            captured_at: envelope.captured_at,
            sequence_number: envelope.sequence_number,
            before,
            after,
        })
    }

    /// Builds the raw `REMOVED` notification the store would emit when a
    /// transaction row expires.
    #[must_use]
    pub fn transaction_expired(transaction: &Transaction, captured_at: DateTime<Utc>) -> Value {
        let mut image = serde_json::to_value(TransactionImage::from(transaction))
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        if let Value::Object(fields) = &mut image {
            fields.insert("recordKind".to_owned(), Value::from("transaction"));
        }
        serde_json::json!({
            "eventId": format!("expire-{}", transaction.transaction_id),
            "changeKind": ChangeKind::Removed,
            "capturedAt": captured_at,
            "beforeImage": image,
        })
    }
}
