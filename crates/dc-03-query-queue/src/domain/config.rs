//! Query queue configuration.

use dc_01_coordination::QueueConfig;
use std::time::Duration;

/// Name of the queue every statement goes through.
pub const DEFAULT_QUEUE_NAME: &str = "db-manager";

/// Pause between readiness probes.
pub const DEFAULT_READY_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Settings of a [`crate::QueuedDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Queue name, used in logs and metrics.
    pub queue_name: String,
    /// Pause between `SELECT 1` probes while the database is not ready.
    pub ready_check_interval: Duration,
    /// Cooldown after each statement.
    pub minimum_delay: Option<Duration>,
}

impl DatabaseConfig {
    /// Queue settings derived from this config. Failed statements are
    /// rejected, never requeued.
    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            minimum_delay: self.minimum_delay,
            ..QueueConfig::fifo()
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            ready_check_interval: DEFAULT_READY_CHECK_INTERVAL,
            minimum_delay: None,
        }
    }
}
