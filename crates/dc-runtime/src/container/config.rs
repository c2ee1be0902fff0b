//! # Core Configuration
//!
//! Unified configuration for the coordination layer.
//!
//! ## Keys
//!
//! | Key | Unit | Default |
//! |-----|------|---------|
//! | `deviceName` | | `Dagcoin Core` |
//! | `hub` | | none |
//! | `DAGCOIN_MESSAGE_TIMEOUT` | ms | 30000 |
//! | `DB_READY_CHECK_INTERVAL` | ms | 10000 |
//! | `MIN_PAYMENT_DELAY` | ms | 5000 |
//! | `BUS_CAPACITY` | events | 1000 |
//!
//! Environment variables use the `DC_` prefix and upper snake case
//! (`deviceName` → `DC_DEVICE_NAME`).

use crate::container::sources::{env_var_name, LayeredConfig, ENV_PREFIX};
use dc_03_query_queue::DatabaseConfig;
use dc_04_device_messaging::MessagingConfig;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Device name key.
pub const DEVICE_NAME_KEY: &str = "deviceName";
/// Hub address key.
pub const HUB_KEY: &str = "hub";
/// Message timeout key, in milliseconds.
pub const MESSAGE_TIMEOUT_KEY: &str = "DAGCOIN_MESSAGE_TIMEOUT";
/// Database readiness probe interval key, in milliseconds.
pub const DB_READY_CHECK_INTERVAL_KEY: &str = "DB_READY_CHECK_INTERVAL";
/// Payment queue minimum delay key, in milliseconds.
pub const MIN_PAYMENT_DELAY_KEY: &str = "MIN_PAYMENT_DELAY";
/// Bus buffer size key.
pub const BUS_CAPACITY_KEY: &str = "BUS_CAPACITY";

/// Every key [`CoreConfig`] reads.
pub const CONFIG_KEYS: [&str; 6] = [
    DEVICE_NAME_KEY,
    HUB_KEY,
    MESSAGE_TIMEOUT_KEY,
    DB_READY_CHECK_INTERVAL_KEY,
    MIN_PAYMENT_DELAY_KEY,
    BUS_CAPACITY_KEY,
];

/// Default delay between attempts of a payment-style queue.
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_secs(5);

/// Default bus buffer size.
pub const DEFAULT_BUS_CAPACITY: usize = 1000;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("INVALID VALUE {value:?} FOR {key}: {reason}")]
    InvalidValue {
        /// Key the value was found under.
        key: String,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },

    /// A setting is out of range.
    #[error("INVALID CONFIGURATION: {0}")]
    Invalid(String),

    /// A required parameter was not given.
    #[error("PARAMETER {0} IS NOT DEFINED")]
    MissingParameter(&'static str),

    /// A configuration source failed.
    #[error("SOURCE {source_name} FAILED: {reason}")]
    Source {
        /// Name of the failing source.
        source_name: String,
        /// What went wrong.
        reason: String,
    },
}

/// Complete coordination layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreConfig {
    /// Device messaging.
    pub messaging: MessagingConfig,
    /// Database access.
    pub storage: DatabaseConfig,
    /// Payment-style queues.
    pub payments: PaymentQueueConfig,
    /// Event bus.
    pub bus: BusConfig,
}

/// Payment-style queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQueueConfig {
    /// Minimum time between two attempts of a requeued payment.
    pub minimum_delay: Duration,
}

impl Default for PaymentQueueConfig {
    fn default() -> Self {
        Self {
            minimum_delay: DEFAULT_PAYMENT_DELAY,
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Events buffered per subscriber before the slowest one lags.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by `DC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let values = CONFIG_KEYS
            .iter()
            .filter_map(|key| {
                std::env::var(env_var_name(ENV_PREFIX, key))
                    .ok()
                    .map(|value| (*key, value))
            })
            .collect();

        let mut config = Self::default();
        config.apply(&values)?;
        Ok(config)
    }

    /// Defaults overridden by whatever `layers` knows.
    pub async fn resolve(layers: &LayeredConfig) -> Result<Self, ConfigError> {
        let values = layers
            .get_many(&CONFIG_KEYS)
            .await?
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();

        let mut config = Self::default();
        config.apply(&values)?;
        Ok(config)
    }

    /// Overwrite the settings named in `values`.
    pub fn apply(&mut self, values: &HashMap<&str, String>) -> Result<(), ConfigError> {
        if let Some(name) = values.get(DEVICE_NAME_KEY) {
            self.messaging.device_name = name.clone();
        }
        if let Some(hub) = values.get(HUB_KEY) {
            self.messaging.hub = Some(hub.clone());
        }
        if let Some(raw) = values.get(MESSAGE_TIMEOUT_KEY) {
            self.messaging.message_timeout = parse_millis(MESSAGE_TIMEOUT_KEY, raw)?;
        }
        if let Some(raw) = values.get(DB_READY_CHECK_INTERVAL_KEY) {
            self.storage.ready_check_interval = parse_millis(DB_READY_CHECK_INTERVAL_KEY, raw)?;
        }
        if let Some(raw) = values.get(MIN_PAYMENT_DELAY_KEY) {
            self.payments.minimum_delay = parse_millis(MIN_PAYMENT_DELAY_KEY, raw)?;
        }
        if let Some(raw) = values.get(BUS_CAPACITY_KEY) {
            self.bus.capacity = parse_number(BUS_CAPACITY_KEY, raw)?;
        }
        Ok(())
    }

    /// Reject settings the layer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.messaging.message_timeout.is_zero() {
            return Err(ConfigError::Invalid("message timeout must be positive".into()));
        }
        if self.messaging.device_name.trim().is_empty() {
            return Err(ConfigError::Invalid("device name must not be empty".into()));
        }
        if self.storage.queue_name.trim().is_empty() {
            return Err(ConfigError::Invalid("database queue name must not be empty".into()));
        }
        if self.storage.ready_check_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "database ready check interval must be positive".into(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::Invalid("bus capacity must be positive".into()));
        }
        Ok(())
    }
}

fn parse_number<N>(key: &str, raw: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: N::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    parse_number(key, raw).map(Duration::from_millis)
}
