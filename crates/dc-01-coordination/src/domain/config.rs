//! # Queue Configuration

use std::time::Duration;

/// Message of a [`crate::timed`] call that was not given one.
pub const DEFAULT_GUARD_MESSAGE: &str = "TIMEOUT WHILE WAITING FOR THE PROMISE TO RESOLVE";

/// What a queue does with an entry whose operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequeuePolicy {
    /// Reject the entry's future with the operation's error.
    #[default]
    Reject,
    /// Push the entry back to the tail of the queue.
    ///
    /// With `max_attempts: Some(m)` the entry is rejected after its `m`-th
    /// failure; `None` requeues forever.
    UntilSuccess {
        /// Failures tolerated before rejecting.
        max_attempts: Option<u32>,
    },
}

impl RequeuePolicy {
    /// Whether an entry that has now failed `failures` times goes back in.
    #[must_use]
    pub fn requeues_after(self, failures: u32) -> bool {
        match self {
            Self::Reject => false,
            Self::UntilSuccess { max_attempts: None } => true,
            Self::UntilSuccess {
                max_attempts: Some(max),
            } => failures < max,
        }
    }
}

/// Settings of one [`crate::SerialQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueConfig {
    /// Cooldown after each execution before the next one may start.
    pub minimum_delay: Option<Duration>,
    /// Failure handling.
    pub requeue: RequeuePolicy,
}

impl QueueConfig {
    /// Plain FIFO: no cooldown, failures rejected.
    #[must_use]
    pub fn fifo() -> Self {
        Self::default()
    }

    /// Requeue failures until they succeed, pausing `minimum_delay` after
    /// every execution.
    #[must_use]
    pub fn until_success(minimum_delay: Duration) -> Self {
        Self {
            minimum_delay: Some(minimum_delay),
            requeue: RequeuePolicy::UntilSuccess { max_attempts: None },
        }
    }

    /// Cap requeues of one entry at `max_attempts` failures.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.requeue = RequeuePolicy::UntilSuccess {
            max_attempts: Some(max_attempts),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_policy() {
        assert!(!RequeuePolicy::Reject.requeues_after(1));
        assert!(RequeuePolicy::UntilSuccess { max_attempts: None }.requeues_after(1_000));

        let capped = RequeuePolicy::UntilSuccess {
            max_attempts: Some(3),
        };
        assert!(capped.requeues_after(2));
        assert!(!capped.requeues_after(3));
    }

    #[test]
    fn test_until_success_builder() {
        let config = QueueConfig::until_success(Duration::from_secs(5)).with_max_attempts(4);
        assert_eq!(config.minimum_delay, Some(Duration::from_secs(5)));
        assert_eq!(
            config.requeue,
            RequeuePolicy::UntilSuccess {
                max_attempts: Some(4)
            }
        );
    }
}
