//! Bounded retry with bisection and dead-lettering.
//!
//! A delivered batch is split into chunks of at most `batch_size` records.
//! When a chunk fails and bisection is enabled, it is split in half and
//! each half is handled again in order, so a single poison record ends up
//! isolated in a chunk of its own. A chunk that can no longer be split is
//! retried with exponential backoff and, once its budget is spent,
//! written verbatim to the dead-letter sink. Healthy records keep flowing.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use storefront_core::clock::Clock;
use storefront_core::dead_letter::{DeadLetter, DeadLetterSink};
use storefront_core::error::DomainError;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::router::FanOutRouter;

/// Retry settings for delivered batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed for a chunk that cannot be split further.
    pub max_retries: u32,
    /// Split failing chunks in half before retrying.
    pub bisect_on_error: bool,
    /// Largest chunk handed to the handler at once.
    pub batch_size: usize,
    /// Delay before the second attempt. Doubles for every further attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            bisect_on_error: true,
            batch_size: 5,
            base_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Outcome of delivering one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    /// Records handled successfully.
    pub processed: usize,
    /// Records written to the dead-letter sink.
    pub dead_lettered: usize,
    /// Handler invocations made.
    pub attempts: u32,
}

/// Handles a chunk of raw records as one unit.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Handles every record of `records`.
    async fn handle(&self, records: &[Value]) -> Result<(), DomainError>;
}

#[async_trait]
impl BatchHandler for FanOutRouter<'_> {
    async fn handle(&self, records: &[Value]) -> Result<(), DomainError> {
        self.handle_batch(records).await.map(|_| ())
    }
}

/// Delivers `records` to `handler` under `policy`.
///
/// # Errors
///
/// Returns an error only if a dead-lettered chunk could not be stored.
/// Handler failures are absorbed by retries and the dead-letter sink.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn deliver_batch(
    records: &[Value],
    policy: &RetryPolicy,
    handler: &dyn BatchHandler,
    sink: &dyn DeadLetterSink,
    clock: &dyn Clock,
) -> Result<DeliveryReport, DomainError> {
    let mut report = DeliveryReport::default();
    let mut pending: VecDeque<&[Value]> = records.chunks(policy.batch_size.max(1)).collect();

    while let Some(chunk) = pending.pop_front() {
        report.attempts += 1;
        let Err(err) = handler.handle(chunk).await else {
            report.processed += chunk.len();
            continue;
        };

        if policy.bisect_on_error && chunk.len() > 1 {
            let (left, right) = chunk.split_at(chunk.len().div_ceil(2));
            warn!(size = chunk.len(), error = %err, "chunk failed, bisecting");
            pending.push_front(right);
            pending.push_front(left);
            continue;
        }

        let (attempts, outcome) = retry_chunk(chunk, policy, handler, err).await;
        report.attempts += attempts - 1;
        match outcome {
            Ok(()) => report.processed += chunk.len(),
            Err(err) => {
                let letter = DeadLetter {
                    id: Uuid::new_v4(),
                    records: chunk.to_vec(),
                    error: err.to_string(),
                    attempts,
                    failed_at: clock.now(),
                };
                sink.send(&letter).await.inspect_err(|sink_err| {
                    error!(dead_letter_id = %letter.id, error = %sink_err, "dead-letter sink failed");
                })?;
                error!(
                    dead_letter_id = %letter.id,
                    size = chunk.len(),
                    attempts,
                    error = %letter.error,
                    "chunk dead-lettered"
                );
                report.dead_lettered += chunk.len();
            }
        }
    }

    info!(
        processed = report.processed,
        dead_lettered = report.dead_lettered,
        attempts = report.attempts,
        "batch delivered"
    );
    Ok(report)
}

/// Retries a chunk whose first attempt already failed with `first_error`.
/// Returns the total number of attempts made, including the first.
async fn retry_chunk(
    chunk: &[Value],
    policy: &RetryPolicy,
    handler: &dyn BatchHandler,
    first_error: DomainError,
) -> (u32, Result<(), DomainError>) {
    let mut attempts = 1;
    let mut last_error = first_error;
    while attempts < policy.max_retries {
        tokio::time::sleep(policy.backoff(attempts)).await;
        attempts += 1;
        match handler.handle(chunk).await {
            Ok(()) => return (attempts, Ok(())),
            Err(err) => {
                warn!(size = chunk.len(), attempts, error = %err, "chunk retry failed");
                last_error = err;
            }
        }
    }
    (attempts, Err(last_error))
}
