//! Ports for the query queue.

pub mod outbound;

pub use outbound::QueryExecutor;
