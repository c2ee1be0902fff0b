//! Prometheus metrics for the coordination layer.
//!
//! All metrics follow the naming convention: `dc_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: queue executions, timeouts, messages, pairings
//! - **Gauge**: correlator waits currently open
//! - **Histogram**: queue execution duration

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SERIAL QUEUES
    // =========================================================================

    /// Executions per queue and outcome
    pub static ref QUEUE_EXECUTIONS: CounterVec = CounterVec::new(
        Opts::new("dc_queue_executions_total", "Operations executed by serial queues"),
        &["queue", "outcome"]  // outcome: resolved/rejected/requeued
    ).expect("metric creation failed");

    /// Time spent inside one queued operation
    pub static ref QUEUE_EXECUTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "dc_queue_execution_duration_seconds",
            "Time spent executing one queued operation"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("bucket layout")),
        &["queue"]
    ).expect("metric creation failed");

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    /// Bounded waits that hit their deadline
    pub static ref TIMEOUTS: CounterVec = CounterVec::new(
        Opts::new("dc_timeouts_total", "Bounded waits that expired"),
        &["kind"]  // kind: guard/retry/correlation
    ).expect("metric creation failed");

    // =========================================================================
    // DEVICE MESSAGING
    // =========================================================================

    /// Envelopes handed to the transport
    pub static ref MESSAGES_SENT: CounterVec = CounterVec::new(
        Opts::new("dc_messages_sent_total", "Envelopes sent to paired devices"),
        &["message_type"]  // request/response/legacy
    ).expect("metric creation failed");

    /// Text payloads received from the transport
    pub static ref MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("dc_messages_received_total", "Text payloads received from devices"),
        &["protocol"]  // dagcoin/foreign/plain/invalid
    ).expect("metric creation failed");

    /// Pairing attempts
    pub static ref PAIRINGS: CounterVec = CounterVec::new(
        Opts::new("dc_pairings_total", "Pairing attempts"),
        &["outcome"]  // existing/paired/failed
    ).expect("metric creation failed");

    /// Correlated waits currently open
    pub static ref CORRELATOR_WAITS_ACTIVE: Gauge = Gauge::new(
        "dc_correlator_waits_active",
        "Correlated response waits currently open"
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// The registry the collectors live in.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register all metrics with the global registry.
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Queues
        Box::new(QUEUE_EXECUTIONS.clone()),
        Box::new(QUEUE_EXECUTION_DURATION.clone()),
        // Timeouts
        Box::new(TIMEOUTS.clone()),
        // Messaging
        Box::new(MESSAGES_SENT.clone()),
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(PAIRINGS.clone()),
        Box::new(CORRELATOR_WAITS_ACTIVE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }

    /// Start a timer for one queue's execution histogram.
    pub fn for_queue(queue: &str) -> Self {
        Self::new(&QUEUE_EXECUTION_DURATION.with_label_values(&[queue]))
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
