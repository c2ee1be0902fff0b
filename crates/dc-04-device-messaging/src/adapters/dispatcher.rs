//! # Inbound Dispatcher
//!
//! Demultiplexes raw transport payloads into protocol events.
//!
//! ```text
//! BusEvent::Text ──parse──→ protocol "dagcoin" ──→ BusEvent::Protocol (dagcoin.<title>)
//!                     │
//!                     ├──→ not JSON       ──→ logged, ignored
//!                     └──→ other protocol ──→ logged, ignored
//! ```

use dc_telemetry::MESSAGES_RECEIVED;
use shared_bus::{BusEvent, EventFilter, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::{EnvelopeError, EventName, MessageEnvelope, PeerId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What became of one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Republished under this event name.
    Published(EventName),
    /// Plain text, not JSON.
    NotJson,
    /// JSON for another protocol.
    ForeignProtocol(String),
    /// Tagged `dagcoin` but malformed.
    Invalid(String),
}

/// Turns `BusEvent::Text` into `BusEvent::Protocol` on the same bus.
pub struct InboundDispatcher {
    bus: Arc<InMemoryEventBus>,
}

impl InboundDispatcher {
    /// Dispatcher republishing onto `bus`.
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self { bus }
    }

    /// Classify `text` from `from`, publishing it when it is a Dagcoin envelope.
    pub async fn handle_text(&self, from: &PeerId, text: &str) -> Dispatch {
        match MessageEnvelope::parse(text) {
            Ok(envelope) => {
                MESSAGES_RECEIVED.with_label_values(&["dagcoin"]).inc();
                let event = envelope.event_name();
                debug!(peer_id = %from, event = %event, message_id = ?envelope.id, "Protocol message received");
                self.bus
                    .publish(BusEvent::Protocol {
                        from: from.clone(),
                        envelope,
                    })
                    .await;
                Dispatch::Published(event)
            }
            Err(EnvelopeError::NotJson(_)) => {
                MESSAGES_RECEIVED.with_label_values(&["plain"]).inc();
                debug!(peer_id = %from, "Ignoring non-JSON message");
                Dispatch::NotJson
            }
            Err(EnvelopeError::ForeignProtocol(protocol)) => {
                MESSAGES_RECEIVED.with_label_values(&["foreign"]).inc();
                debug!(peer_id = %from, protocol = %protocol, "Ignoring message of another protocol");
                Dispatch::ForeignProtocol(protocol)
            }
            Err(EnvelopeError::Invalid(reason)) => {
                MESSAGES_RECEIVED.with_label_values(&["invalid"]).inc();
                warn!(peer_id = %from, reason = %reason, "Dropping malformed dagcoin message");
                Dispatch::Invalid(reason)
            }
        }
    }

    /// Dispatch every transport payload on the bus until it closes.
    ///
    /// The subscription is open before this returns.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut inbox = self
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Transport]));
        info!("Inbound dispatcher started");

        tokio::spawn(async move {
            while let Some(event) = inbox.recv().await {
                if let BusEvent::Text { from, text } = event {
                    self.handle_text(&from, &text).await;
                }
            }
            debug!("Inbound dispatcher stopped, bus closed");
        })
    }
}
