//! # Domain Errors
//!
//! Failures of the database backend and of the queue in front of it.

use dc_01_coordination::QueueError;
use thiserror::Error;

/// Error reported by a [`crate::QueryExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The backend rejected or failed the statement.
    #[error("{0}")]
    Backend(String),

    /// The backend is not open yet (or any more).
    #[error("database not ready: {0}")]
    Unavailable(String),
}

/// A failed statement together with what was run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("QUERY {statement} WITH PARAMETER {parameters} FAILED: {source}")]
pub struct StatementError {
    /// SQL text with `?` placeholders.
    pub statement: String,
    /// Parameters rendered as a JSON array.
    pub parameters: String,
    /// Backend error.
    #[source]
    pub source: QueryError,
}

/// Errors returned by [`crate::QueuedDatabase`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    /// The statement failed and was rejected by the queue.
    #[error(transparent)]
    Statement(#[from] StatementError),

    /// The queue dropped the entry without settling it.
    #[error("query queue {0} closed")]
    Closed(String),

    /// A row did not have the expected shape.
    #[error("unexpected row shape: {0}")]
    Decode(String),
}

impl From<QueueError<StatementError>> for DatabaseError {
    fn from(error: QueueError<StatementError>) -> Self {
        match error {
            QueueError::Rejected { error, .. } => Self::Statement(error),
            QueueError::Closed { queue } => Self::Closed(queue),
        }
    }
}
