//! Storefront Core — shared domain abstractions.
//!
//! This crate defines the records and ports that the fan-out pipeline,
//! the storage adapters, and the delivery adapters all depend on. It
//! contains no infrastructure code.

pub mod audit;
pub mod channel;
pub mod clock;
pub mod command;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod ledger;
pub mod repository;
pub mod transaction;
