//! Structured logging helpers.
//!
//! Every log line carries a `component` field so output from the queue, the
//! correlator and the messaging layer can be told apart when interleaved.

/// Emit an event with a `component` field.
///
/// ```rust,ignore
/// dc_telemetry::log_event!(info, "db-manager", "Database ready", attempts = 3);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a peer-related event with standard fields.
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $component:expr, $msg:expr, $peer_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            peer_id = %$peer_id,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand_without_subscriber() {
        let peer = "0DEVICE";
        log_event!(info, "test", "plain event");
        log_event!(debug, "test", "event with fields", attempts = 2);
        log_peer_event!(warn, "test", "peer event", peer, subject = "is-connected");
    }
}
