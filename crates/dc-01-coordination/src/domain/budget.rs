//! # Retry Budget
//!
//! How long each attempt may take and how many times a timed-out attempt
//! is re-issued.

use std::time::Duration;

/// Message of every intermediate timeout.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "TIMEOUT OCCURRED";

/// Message of the error returned once the budget is spent.
pub const DEFAULT_FINAL_TIMEOUT_MESSAGE: &str = "NO MORE ATTEMPTS";

/// Remaining re-attempts after the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempts {
    /// Re-attempt at most `n` more times.
    Limited(u32),
    /// Re-attempt until an attempt settles.
    Forever,
}

impl Attempts {
    /// Budget left after one more timeout, or `None` when exhausted.
    #[must_use]
    pub fn consume(self) -> Option<Self> {
        match self {
            Self::Limited(0) => None,
            Self::Limited(n) => Some(Self::Limited(n - 1)),
            Self::Forever => Some(Self::Forever),
        }
    }
}

/// Settings for one [`crate::retry_timed`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    /// Deadline of each attempt.
    pub timeout: Duration,
    /// Re-attempts allowed after the first timeout.
    pub attempts: Attempts,
    /// Logged after each timeout.
    pub timeout_message: String,
    /// Error message once no attempts remain.
    pub final_timeout_message: String,
    /// Pause between a timeout and the next attempt.
    pub retry_delay: Duration,
}

impl RetryBudget {
    /// Budget with default messages and no delay between attempts.
    pub fn new(timeout: Duration, attempts: Attempts) -> Self {
        Self {
            timeout,
            attempts,
            timeout_message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
            final_timeout_message: DEFAULT_FINAL_TIMEOUT_MESSAGE.to_string(),
            retry_delay: Duration::ZERO,
        }
    }

    /// Override the per-attempt timeout message.
    #[must_use]
    pub fn with_timeout_message(mut self, message: impl Into<String>) -> Self {
        self.timeout_message = message.into();
        self
    }

    /// Override the give-up message.
    #[must_use]
    pub fn with_final_timeout_message(mut self, message: impl Into<String>) -> Self {
        self.final_timeout_message = message.into();
        self
    }

    /// Wait `delay` before each re-attempt.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}
