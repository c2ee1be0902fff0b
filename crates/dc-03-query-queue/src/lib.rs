//! # DC-03 Query Queue
//!
//! Serialized access to the single-writer database.
//!
//! **Subsystem ID:** 3
//! **Architecture:** Hexagonal (Ports & Adapters)
//!
//! ## Guarantees
//!
//! - At most one statement in flight against the backend
//! - Statements run in the order they were issued
//! - A failed statement is rejected to its caller with the statement and
//!   parameters in the error message; the queue keeps serving
//!
//! ## Module Structure
//!
//! ```text
//! dc-03-query-queue/
//! ├── domain/      # DatabaseConfig, QueryCall, Row, errors, SQL text
//! ├── ports/       # QueryExecutor
//! ├── adapters/    # ScriptedQueryExecutor
//! └── service/     # QueuedDatabase
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::ScriptedQueryExecutor;
pub use domain::{
    CorrespondentSummary, DatabaseConfig, DatabaseError, QueryCall, QueryError, Row,
    StatementError, CORRESPONDENT_LIST, DEFAULT_QUEUE_NAME, DEFAULT_READY_CHECK_INTERVAL,
    LOOKUP_DEVICE_BY_PUBKEY, READY_CHECK,
};
pub use ports::QueryExecutor;
pub use service::QueuedDatabase;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
