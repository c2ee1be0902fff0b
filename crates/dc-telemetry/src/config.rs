//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to logs
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to register Prometheus collectors
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "dagcoin-core".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DC_SERVICE_NAME`: Service name (default: dagcoin-core)
    /// - `DC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `DC_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `DC_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `DC_METRICS`: Register metrics (default: true)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("DC_SERVICE_NAME")
                .unwrap_or_else(|_| "dagcoin-core".to_string()),

            log_level: env::var("DC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("DC_CONSOLE_OUTPUT")
                .map(|v| flag_enabled(&v, true))
                .unwrap_or(true),

            json_logs: env::var("DC_JSON_LOGS")
                .map(|v| flag_enabled(&v, false))
                .unwrap_or(false),

            metrics_enabled: env::var("DC_METRICS")
                .map(|v| flag_enabled(&v, true))
                .unwrap_or(true),
        }
    }
}

fn flag_enabled(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "dagcoin-core");
        assert_eq!(config.log_level, "info");
        assert!(config.console_output);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_flag_parsing() {
        assert!(flag_enabled("TRUE", false));
        assert!(!flag_enabled("0", true));
        assert!(flag_enabled("maybe", true));
        assert!(!flag_enabled("maybe", false));
    }
}
