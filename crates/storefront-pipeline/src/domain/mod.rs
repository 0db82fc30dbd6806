//! Domain model of the fan-out pipeline.

pub mod commands;
pub mod notification;
pub mod tracker;
