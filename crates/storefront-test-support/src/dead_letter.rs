//! Test dead-letter sinks.

use std::sync::Mutex;

use async_trait::async_trait;
use storefront_core::dead_letter::{DeadLetter, DeadLetterSink};
use storefront_core::error::DomainError;

/// A sink that keeps every dead letter in memory.
#[derive(Debug, Default)]
pub struct RecordingDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl RecordingDeadLetterSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all dead letters received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetterSink {
    async fn send(&self, letter: &DeadLetter) -> Result<(), DomainError> {
        self.letters.lock().unwrap().push(letter.clone());
        Ok(())
    }
}

/// A sink that refuses every dead letter.
#[derive(Debug)]
pub struct FailingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for FailingDeadLetterSink {
    async fn send(&self, _letter: &DeadLetter) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("dead-letter queue unavailable".into()))
    }
}
