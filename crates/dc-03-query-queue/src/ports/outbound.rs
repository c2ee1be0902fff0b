//! # Outbound Ports (Driven Ports)
//!
//! The database backend the queue serializes access to.

use crate::domain::{QueryError, Row};
use async_trait::async_trait;
use serde_json::Value;

/// Runs one SQL statement.
///
/// Implementations need not be safe for concurrent statements: the
/// `QueuedDatabase` in front of them never issues more than one at a time.
///
/// Testing: `ScriptedQueryExecutor` (adapters)
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `statement` with positional `params`.
    async fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>, QueryError>;
}
