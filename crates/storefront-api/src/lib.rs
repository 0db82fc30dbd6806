//! Storefront event pipeline — HTTP service library.
//!
//! Exposes the change-feed intake, the read API over the event history,
//! and the transaction lifecycle endpoints.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod telemetry;
