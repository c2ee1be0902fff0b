//! # In-Memory Pairing
//!
//! [`PairingPrimitives`] backed by a correspondent map. The handshake
//! confirms the correspondent immediately, as a remote device accepting
//! the pairing would.

use crate::domain::{IdentityError, ReversePairingInfo, TransportError};
use crate::ports::PairingPrimitives;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{CorrespondentRecord, PeerId};
use std::collections::HashMap;
use tracing::debug;

/// A handshake as handed to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Hub the handshake went through.
    pub hub: String,
    /// Recipient public key.
    pub public_key: String,
    /// Secret from the recipient's pairing code.
    pub pairing_secret: String,
    /// Our own secret for the reverse pairing.
    pub reverse_pairing_secret: String,
}

/// Correspondent store plus handshake log.
pub struct InMemoryPairing {
    own_secret: String,
    correspondents: RwLock<HashMap<PeerId, CorrespondentRecord>>,
    handshakes: RwLock<Vec<Handshake>>,
    handshake_failure: RwLock<Option<String>>,
}

impl InMemoryPairing {
    /// Store whose reverse pairing secret is `own_secret`.
    pub fn new(own_secret: impl Into<String>) -> Self {
        Self {
            own_secret: own_secret.into(),
            correspondents: RwLock::new(HashMap::new()),
            handshakes: RwLock::new(Vec::new()),
            handshake_failure: RwLock::new(None),
        }
    }

    /// Device address derived from a public key.
    #[must_use]
    pub fn address_for(public_key: &str) -> PeerId {
        PeerId::new(format!("0{}", public_key.to_uppercase()))
    }

    /// Store `record` as-is.
    pub fn insert(&self, record: CorrespondentRecord) {
        self.correspondents
            .write()
            .insert(record.peer_id.clone(), record);
    }

    /// Fail every following handshake with `reason`.
    pub fn fail_handshakes(&self, reason: impl Into<String>) {
        *self.handshake_failure.write() = Some(reason.into());
    }

    /// Handshakes sent so far.
    #[must_use]
    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.read().clone()
    }

    /// Stored correspondent, if any.
    #[must_use]
    pub fn correspondent(&self, peer: &PeerId) -> Option<CorrespondentRecord> {
        self.correspondents.read().get(peer).cloned()
    }
}

#[async_trait]
impl PairingPrimitives for InMemoryPairing {
    async fn register_unconfirmed_peer(
        &self,
        public_key: &str,
        hub: &str,
        name: &str,
    ) -> Result<PeerId, IdentityError> {
        if public_key.is_empty() {
            return Err(IdentityError::Rejected("EMPTY PUBLIC KEY".to_string()));
        }

        let peer = Self::address_for(public_key);
        let mut correspondents = self.correspondents.write();
        correspondents.entry(peer.clone()).or_insert_with(|| {
            CorrespondentRecord::unconfirmed(peer.clone(), public_key, hub, name)
        });
        debug!(peer_id = %peer, "Unconfirmed correspondent stored");

        Ok(peer)
    }

    async fn await_reverse_pairing(&self) -> Result<ReversePairingInfo, IdentityError> {
        Ok(ReversePairingInfo {
            pairing_secret: self.own_secret.clone(),
        })
    }

    async fn send_pairing_handshake(
        &self,
        hub: &str,
        public_key: &str,
        pairing_secret: &str,
        reverse_pairing_secret: &str,
    ) -> Result<(), TransportError> {
        if let Some(reason) = self.handshake_failure.read().clone() {
            return Err(TransportError::Hub(reason));
        }

        self.handshakes.write().push(Handshake {
            hub: hub.to_string(),
            public_key: public_key.to_string(),
            pairing_secret: pairing_secret.to_string(),
            reverse_pairing_secret: reverse_pairing_secret.to_string(),
        });

        let peer = Self::address_for(public_key);
        if let Some(record) = self.correspondents.write().get_mut(&peer) {
            record.is_confirmed = true;
        }

        Ok(())
    }

    async fn read_correspondent(&self, peer: &PeerId) -> Result<CorrespondentRecord, IdentityError> {
        self.correspondent(peer)
            .ok_or_else(|| IdentityError::UnknownCorrespondent(peer.clone()))
    }
}
