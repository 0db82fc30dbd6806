//! Storefront — change-notification fan-out pipeline.
//!
//! Responsible for classifying source-table changes, recording event
//! history, resolving expired transactions for waiting clients, and
//! isolating poison records behind a bounded retry policy.

pub mod application;
pub mod domain;
