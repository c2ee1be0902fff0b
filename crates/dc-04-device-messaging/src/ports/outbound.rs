//! # Outbound Ports (Driven Ports)
//!
//! The transport and identity primitives the messaging layer drives.
//!
//! Testing: `InMemoryHub`, `InMemoryPairing` (adapters)

use crate::domain::{IdentityError, ReversePairingInfo, TransportError};
use async_trait::async_trait;
use shared_types::{CorrespondentRecord, PeerId};
use tokio::sync::oneshot;

/// How far a sent message got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The hub acknowledged the message.
    Acknowledged,
    /// Persisted locally for later delivery; not acknowledged yet.
    SavedPending,
}

/// Fires once when a message has been persisted, before any acknowledgement.
#[derive(Debug)]
pub struct SavedNotifier(oneshot::Sender<PeerId>);

impl SavedNotifier {
    /// Notifier plus the receiver it fires into.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<PeerId>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Report `peer`'s message as saved. A receiver that went away is ignored.
    pub fn notify(self, peer: PeerId) {
        let _ = self.0.send(peer);
    }
}

/// Point-to-point transport to paired devices.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Send `payload` to `peer` as a message of kind `kind`, resolving once
    /// the hub acknowledged it.
    ///
    /// `on_saved`, when given, fires as soon as the message is persisted,
    /// which may be well before the acknowledgement. A transport that stops
    /// tracking a persisted message returns [`Delivery::SavedPending`].
    async fn send_to_peer(
        &self,
        peer: &PeerId,
        kind: &str,
        payload: String,
        on_saved: Option<SavedNotifier>,
    ) -> Result<Delivery, TransportError>;
}

/// Device identity and pairing primitives.
#[async_trait]
pub trait PairingPrimitives: Send + Sync {
    /// Store the peer as an unconfirmed correspondent, returning its address.
    async fn register_unconfirmed_peer(
        &self,
        public_key: &str,
        hub: &str,
        name: &str,
    ) -> Result<PeerId, IdentityError>;

    /// Start waiting for the peer's pairing; yields our own secret.
    async fn await_reverse_pairing(&self) -> Result<ReversePairingInfo, IdentityError>;

    /// Send the pairing handshake through `hub`; resolves once delivered.
    async fn send_pairing_handshake(
        &self,
        hub: &str,
        public_key: &str,
        pairing_secret: &str,
        reverse_pairing_secret: &str,
    ) -> Result<(), TransportError>;

    /// Read a stored correspondent.
    async fn read_correspondent(&self, peer: &PeerId) -> Result<CorrespondentRecord, IdentityError>;
}
