//! Storefront Delivery — pushing status to live clients and emitting audit
//! records.
//!
//! [`channel_delivery::ChannelDelivery`] is the adapter the router talks to.
//! It wraps any [`storefront_core::channel::ChannelGateway`] and turns stale
//! connections into a `false` result instead of an error. The HTTP modules
//! hold the production gateway and audit bus clients.

pub mod channel_delivery;
pub mod http_audit_bus;
pub mod http_gateway;
