//! # Bus Events
//!
//! Defines all event types that flow through the shared bus.

use serde::{Deserialize, Serialize};
use shared_types::{EventName, MessageEnvelope, MessageType, PeerId};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BusEvent {
    // =========================================================================
    // TRANSPORT
    // =========================================================================
    /// A text payload delivered by the hub transport.
    Text {
        /// Device that sent the payload.
        from: PeerId,
        /// Raw payload, JSON or plain chat text.
        text: String,
    },

    // =========================================================================
    // DAGCOIN PROTOCOL
    // =========================================================================
    /// A Dagcoin envelope, republished under `dagcoin.<title>`.
    Protocol {
        /// Device that sent the envelope (taken from the transport).
        from: PeerId,
        /// The decoded envelope.
        envelope: MessageEnvelope,
    },

    // =========================================================================
    // PAIRING
    // =========================================================================
    /// A pairing handshake with `peer` completed.
    Paired {
        /// The newly paired device.
        peer: PeerId,
    },
}

impl BusEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Text { .. } => EventTopic::Transport,
            Self::Protocol { envelope, .. } => match envelope.message_type {
                Some(MessageType::Request) => EventTopic::Request,
                Some(MessageType::Response) => EventTopic::Response,
                None => EventTopic::Legacy,
            },
            Self::Paired { .. } => EventTopic::Pairing,
        }
    }

    /// Device the event originates from.
    #[must_use]
    pub fn sender(&self) -> &PeerId {
        match self {
            Self::Text { from, .. } | Self::Protocol { from, .. } => from,
            Self::Paired { peer } => peer,
        }
    }

    /// Bus event name, for protocol events only.
    #[must_use]
    pub fn event_name(&self) -> Option<EventName> {
        match self {
            Self::Protocol { envelope, .. } => Some(envelope.event_name()),
            _ => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Raw transport payloads.
    Transport,
    /// Addressed requests (`dagcoin.request.*`).
    Request,
    /// Addressed responses (`dagcoin.response.*`).
    Response,
    /// Envelopes without a message type (`dagcoin.connected`, ...).
    Legacy,
    /// Pairing completions.
    Pairing,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Senders to include. Empty means all senders.
    pub senders: Vec<PeerId>,
    /// Event names to include. Empty means all; non-empty excludes
    /// events that have no name.
    pub event_names: Vec<EventName>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            ..Self::default()
        }
    }

    /// Create a filter for one protocol event name.
    #[must_use]
    pub fn event(name: EventName) -> Self {
        Self {
            event_names: vec![name],
            ..Self::default()
        }
    }

    /// Restrict the filter to events from `sender`.
    #[must_use]
    pub fn with_sender(mut self, sender: PeerId) -> Self {
        self.senders.push(sender);
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BusEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let sender_match = self.senders.is_empty() || self.senders.contains(event.sender());

        let name_match = self.event_names.is_empty()
            || event
                .event_name()
                .is_some_and(|name| self.event_names.contains(&name));

        topic_match && sender_match && name_match
    }
}
