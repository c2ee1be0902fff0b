//! # Connection Responder
//!
//! Answers connection checks from other devices:
//!
//! - `dagcoin.request.is-connected` → `response.is-connected` with the request's id
//! - `dagcoin.is-connected` (legacy) → bare `connected`

use crate::domain::{ProtocolError, IS_CONNECTED, LEGACY_CONNECTED, LEGACY_IS_CONNECTED};
use crate::ports::{DeviceTransport, PairingPrimitives};
use crate::service::MessageProtocol;
use serde_json::json;
use shared_bus::{BusEvent, EventFilter, InMemoryEventBus};
use shared_types::EventName;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Replies to `is-connected` checks through the protocol it wraps.
pub struct ConnectionResponder<T, P> {
    protocol: Arc<MessageProtocol<T, P>>,
    bus: Arc<InMemoryEventBus>,
}

impl<T, P> ConnectionResponder<T, P>
where
    T: DeviceTransport + 'static,
    P: PairingPrimitives + 'static,
{
    /// Responder listening on `bus` and answering through `protocol`.
    pub fn new(protocol: Arc<MessageProtocol<T, P>>, bus: Arc<InMemoryEventBus>) -> Self {
        Self { protocol, bus }
    }

    /// Events this responder answers.
    #[must_use]
    pub fn filter() -> EventFilter {
        EventFilter {
            event_names: vec![
                EventName::request(IS_CONNECTED),
                EventName::for_title(LEGACY_IS_CONNECTED),
            ],
            ..EventFilter::default()
        }
    }

    /// Answer `event` if it is a connection check. Returns whether a reply
    /// was sent.
    pub async fn handle(&self, event: &BusEvent) -> Result<bool, ProtocolError> {
        let BusEvent::Protocol { from, envelope } = event else {
            return Ok(false);
        };

        match (envelope.message_type, envelope.id) {
            (Some(_), Some(id)) if envelope.event_name() == EventName::request(IS_CONNECTED) => {
                debug!(peer_id = %from, message_id = %id, "Answering is-connected request");
                self.protocol
                    .send_response(from, IS_CONNECTED, json!({}), id)
                    .await?;
                Ok(true)
            }
            (None, _) if envelope.title == LEGACY_IS_CONNECTED => {
                debug!(peer_id = %from, "Answering legacy is-connected");
                self.protocol.send_legacy(from, LEGACY_CONNECTED).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Answer connection checks until the bus closes.
    ///
    /// The subscription is open before this returns.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut inbox = self.bus.subscribe(Self::filter());
        info!("Connection responder started");

        tokio::spawn(async move {
            while let Some(event) = inbox.recv().await {
                if let Err(e) = self.handle(&event).await {
                    warn!(peer_id = %event.sender(), error = %e, "Could not answer connection check");
                }
            }
            debug!("Connection responder stopped, bus closed");
        })
    }
}
