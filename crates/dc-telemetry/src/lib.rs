//! # Dagcoin Telemetry
//!
//! Structured logging and Prometheus metrics for the coordination layer.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DC_SERVICE_NAME` | `dagcoin-core` | Service name attached to every log line |
//! | `DC_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `DC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `DC_JSON_LOGS` | `false` | JSON formatted logs |
//! | `DC_METRICS` | `true` | Register Prometheus metrics |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, CORRELATOR_WAITS_ACTIVE,
    MESSAGES_RECEIVED, MESSAGES_SENT, PAIRINGS, QUEUE_EXECUTIONS, QUEUE_EXECUTION_DURATION,
    TIMEOUTS,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    /// A collector could not be registered or encoded.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid telemetry settings.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and (optionally) metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Initialize metrics first
    let metrics_handle = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "dagcoin-core");
    }

    #[test]
    fn test_metric_inc_macro() {
        metric_inc!(TIMEOUTS, &["macro-test"]);
        assert!(TIMEOUTS.with_label_values(&["macro-test"]).get() >= 1.0);
    }
}
