//! # Domain Errors
//!
//! Error types for the coordination primitives.

use thiserror::Error;

/// Failures of bounded waits and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    /// The deadline expired before the operation settled.
    #[error("{message}")]
    Timeout {
        /// Caller-supplied (or default) timeout message.
        message: String,
    },

    /// Every attempt of a retried operation timed out.
    #[error("{message} (tag {tag}, {attempts} attempts)")]
    RetriesExhausted {
        /// Identifier the retry was started with.
        tag: String,
        /// Producer invocations made.
        attempts: u32,
        /// The final timeout message.
        message: String,
    },

    /// A required argument was missing or empty.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// The spawned operation panicked or was aborted.
    #[error("operation task failed: {0}")]
    TaskFailed(String),
}

impl CoordinationError {
    /// True for both single timeouts and exhausted retries.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RetriesExhausted { .. })
    }
}

/// Failures reported by a [`crate::SerialQueue`] to the enqueuer.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The operation failed and the queue does not (or no longer) requeue it.
    #[error("queue {queue} rejected entry {sequence}: {error}")]
    Rejected {
        /// Queue name.
        queue: String,
        /// Diagnostic sequence number of the entry.
        sequence: u64,
        /// The operation's own error.
        error: E,
    },

    /// The entry was dropped without being resolved.
    #[error("queue {queue} dropped an entry before settling it")]
    Closed {
        /// Queue name.
        queue: String,
    },
}

impl<E> QueueError<E> {
    /// The operation's error, if the entry was rejected.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Rejected { error, .. } => Some(error),
            Self::Closed { .. } => None,
        }
    }

    /// Name of the queue that produced the error.
    #[must_use]
    pub fn queue(&self) -> &str {
        match self {
            Self::Rejected { queue, .. } | Self::Closed { queue } => queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_displays_message_verbatim() {
        let error = CoordinationError::Timeout {
            message: "TIMEOUT OCCURRED".into(),
        };
        assert_eq!(error.to_string(), "TIMEOUT OCCURRED");
        assert!(error.is_timeout());
        assert!(!CoordinationError::MissingParameter("tag").is_timeout());
    }

    #[test]
    fn test_queue_error_accessors() {
        let error: QueueError<String> = QueueError::Rejected {
            queue: "db-manager".into(),
            sequence: 4,
            error: "disk full".into(),
        };
        assert_eq!(error.queue(), "db-manager");
        assert_eq!(
            error.to_string(),
            "queue db-manager rejected entry 4: disk full"
        );
        assert_eq!(error.into_inner().as_deref(), Some("disk full"));
    }
}
