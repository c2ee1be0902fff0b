//! # Retry Scheduler
//!
//! Re-issues a bounded-wait operation while it keeps timing out.
//!
//! Only timeouts consume the budget. An operation that settles with an
//! error has produced an outcome and is returned as-is; a producer that
//! cannot build the operation fails the call before any wait starts.

use crate::algorithms::timeout_guard::timed;
use crate::domain::{CoordinationError, RetryBudget};
use dc_telemetry::TIMEOUTS;
use std::future::Future;
use tracing::{info, warn};

/// Run `producer`'s operation under `budget`, re-invoking the producer after
/// each timeout.
///
/// With every attempt timing out, `Attempts::Limited(n)` calls the producer
/// exactly `n + 1` times before failing with
/// [`CoordinationError::RetriesExhausted`].
///
/// # Errors
///
/// - `CoordinationError::MissingParameter("tag")` - empty tag, producer never called
/// - the producer's error, unchanged
/// - the operation's error, unchanged
/// - `CoordinationError::RetriesExhausted` - budget spent
pub async fn retry_timed<T, E, F, Fut>(tag: &str, budget: &RetryBudget, mut producer: F) -> Result<T, E>
where
    F: FnMut() -> Result<Fut, E>,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<CoordinationError> + Send + 'static,
{
    if tag.trim().is_empty() {
        return Err(CoordinationError::MissingParameter("tag").into());
    }

    let mut remaining = budget.attempts;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let operation = producer()?;

        match timed(operation, budget.timeout, Some(&budget.timeout_message)).await {
            Ok(outcome) => return outcome,
            Err(CoordinationError::Timeout { message }) => match remaining.consume() {
                Some(next) => {
                    remaining = next;
                    warn!(tag, attempt, %message, "Attempt timed out, trying again");
                    if !budget.retry_delay.is_zero() {
                        tokio::time::sleep(budget.retry_delay).await;
                    }
                    info!(tag, attempt = attempt + 1, "Retrying");
                }
                None => {
                    TIMEOUTS.with_label_values(&["retry"]).inc();
                    warn!(tag, attempts = attempt, "Giving up: {}", budget.final_timeout_message);
                    return Err(CoordinationError::RetriesExhausted {
                        tag: tag.to_string(),
                        attempts: attempt,
                        message: budget.final_timeout_message.clone(),
                    }
                    .into());
                }
            },
            Err(other) => return Err(other.into()),
        }
    }
}

/// A tag and budget bundled for repeated use.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    tag: String,
    budget: RetryBudget,
}

impl RetryScheduler {
    /// Scheduler logging under `tag`.
    pub fn new(tag: impl Into<String>, budget: RetryBudget) -> Self {
        Self {
            tag: tag.into(),
            budget,
        }
    }

    /// The budget each run starts from.
    #[must_use]
    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// See [`retry_timed`].
    pub async fn run<T, E, F, Fut>(&self, producer: F) -> Result<T, E>
    where
        F: FnMut() -> Result<Fut, E>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<CoordinationError> + Send + 'static,
    {
        retry_timed(&self.tag, &self.budget, producer).await
    }
}
