//! # Timeout Guard
//!
//! Races one pending operation against a single timer.
//!
//! ## Cancellation
//!
//! The operation is spawned as its own task and is **not** cancelled when
//! the deadline wins: it keeps running and its late outcome is discarded.
//! Callers whose operations have side effects (a send that is eventually
//! acknowledged, a write that eventually lands) must tolerate the work
//! completing after they were told it timed out.
//!
//! [`TimeoutGuard::race`] is the in-place variant for listeners: the losing
//! future is dropped together with whatever it owns.

use crate::domain::{CoordinationError, DEFAULT_GUARD_MESSAGE};
use dc_telemetry::TIMEOUTS;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// Settle with `operation`'s output, or fail with
/// [`CoordinationError::Timeout`] once `deadline` has elapsed.
///
/// `message` defaults to [`DEFAULT_GUARD_MESSAGE`]. The timer is dropped as
/// soon as either side settles.
pub async fn timed<F, T>(
    operation: F,
    deadline: Duration,
    message: Option<&str>,
) -> Result<T, CoordinationError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = operation.await;
        if tx.send(outcome).is_err() {
            debug!("Operation settled after its deadline, outcome discarded");
        }
    });

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(outcome)) => Ok(outcome),
        // Sender dropped without sending: the task panicked or was aborted.
        Ok(Err(_)) => Err(CoordinationError::TaskFailed(
            "operation ended without producing an outcome".to_string(),
        )),
        Err(_) => Err(expired(
            deadline,
            message.unwrap_or(DEFAULT_GUARD_MESSAGE).to_string(),
        )),
    }
}

fn expired(deadline: Duration, message: String) -> CoordinationError {
    TIMEOUTS.with_label_values(&["guard"]).inc();
    debug!(deadline_ms = deadline.as_millis() as u64, %message, "Bounded wait expired");
    CoordinationError::Timeout { message }
}

/// Reusable deadline + message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutGuard {
    deadline: Duration,
    message: String,
}

impl TimeoutGuard {
    /// Guard with the default timeout message.
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            message: DEFAULT_GUARD_MESSAGE.to_string(),
        }
    }

    /// Use `message` for timeouts.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Deadline applied to every run.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Race `operation` against this guard's deadline.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, CoordinationError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        timed(operation, self.deadline, Some(&self.message)).await
    }

    /// Poll `operation` in place against the deadline. On timeout the
    /// operation is dropped, releasing anything it holds.
    pub async fn race<F, T>(&self, operation: F) -> Result<T, CoordinationError>
    where
        F: Future<Output = T>,
    {
        self.race_from(Instant::now(), operation).await
    }

    /// Like [`Self::race`], with the deadline counted from `started` instead
    /// of from the first poll.
    pub async fn race_from<F, T>(
        &self,
        started: Instant,
        operation: F,
    ) -> Result<T, CoordinationError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout_at(started + self.deadline, operation)
            .await
            .map_err(|_| expired(self.deadline, self.message.clone()))
    }
}
