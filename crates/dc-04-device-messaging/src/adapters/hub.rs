//! # In-Memory Hub
//!
//! A [`DeviceTransport`] that routes text payloads straight onto the
//! receiving device's event bus. Used to wire several nodes inside one
//! process and by the tests.
//!
//! ```text
//! [node A] ──send_to_peer──→ [InMemoryHub A] ──BusEvent::Text──→ [bus of node B]
//! ```

use crate::domain::TransportError;
use crate::ports::{Delivery, DeviceTransport, SavedNotifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_bus::{BusEvent, EventPublisher, InMemoryEventBus};
use shared_types::{MessageEnvelope, PeerId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// One message handed to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient.
    pub to: PeerId,
    /// Payload kind, `text` for protocol messages.
    pub kind: String,
    /// Raw payload.
    pub payload: String,
}

impl SentMessage {
    /// The payload decoded as a Dagcoin envelope, if it is one.
    #[must_use]
    pub fn envelope(&self) -> Option<MessageEnvelope> {
        MessageEnvelope::parse(&self.payload).ok()
    }
}

/// In-process hub for one local device.
pub struct InMemoryHub {
    /// Address the receiving side sees as sender.
    address: PeerId,
    routes: RwLock<HashMap<PeerId, Arc<InMemoryEventBus>>>,
    outbox: RwLock<Vec<SentMessage>>,
    failing: RwLock<HashMap<PeerId, String>>,
    save_only: RwLock<HashSet<PeerId>>,
    ack_latency: RwLock<Duration>,
}

impl InMemoryHub {
    /// Hub sending as `address`.
    pub fn new(address: PeerId) -> Self {
        Self {
            address,
            routes: RwLock::new(HashMap::new()),
            outbox: RwLock::new(Vec::new()),
            failing: RwLock::new(HashMap::new()),
            save_only: RwLock::new(HashSet::new()),
            ack_latency: RwLock::new(Duration::ZERO),
        }
    }

    /// Deliver messages for `peer` onto `bus`.
    pub fn connect(&self, peer: PeerId, bus: Arc<InMemoryEventBus>) {
        debug!(from = %self.address, to = %peer, "Route added");
        self.routes.write().insert(peer, bus);
    }

    /// Fail every send to `peer` with `reason`.
    pub fn fail_sends_to(&self, peer: PeerId, reason: impl Into<String>) {
        self.failing.write().insert(peer, reason.into());
    }

    /// Persist messages to `peer` without ever delivering or acknowledging them.
    pub fn save_only(&self, peer: PeerId) {
        self.save_only.write().insert(peer);
    }

    /// Hold every acknowledgement back by `latency` after delivery.
    pub fn delay_acks(&self, latency: Duration) {
        *self.ack_latency.write() = latency;
    }

    /// Address of the local device.
    #[must_use]
    pub fn address(&self) -> &PeerId {
        &self.address
    }

    /// Everything handed to the hub so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.read().clone()
    }
}

#[async_trait]
impl DeviceTransport for InMemoryHub {
    async fn send_to_peer(
        &self,
        peer: &PeerId,
        kind: &str,
        payload: String,
        on_saved: Option<SavedNotifier>,
    ) -> Result<Delivery, TransportError> {
        self.outbox.write().push(SentMessage {
            to: peer.clone(),
            kind: kind.to_string(),
            payload: payload.clone(),
        });

        if let Some(reason) = self.failing.read().get(peer).cloned() {
            return Err(TransportError::Undeliverable {
                peer: peer.clone(),
                reason,
            });
        }

        let route = self
            .routes
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError::UnknownPeer(peer.clone()))?;

        if let Some(notifier) = on_saved {
            notifier.notify(peer.clone());
        }

        if self.save_only.read().contains(peer) {
            trace!(to = %peer, "Message saved, not delivered");
            return Ok(Delivery::SavedPending);
        }

        let receivers = route
            .publish(BusEvent::Text {
                from: self.address.clone(),
                text: payload,
            })
            .await;
        trace!(from = %self.address, to = %peer, receivers, "Message delivered");

        let latency = *self.ack_latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        Ok(Delivery::Acknowledged)
    }
}
