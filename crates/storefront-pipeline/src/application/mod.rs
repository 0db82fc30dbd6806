//! Application services: routing, retry, queries, and transaction commands.

pub mod query_handlers;
pub mod retry;
pub mod router;
pub mod transaction_handlers;
