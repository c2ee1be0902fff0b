//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `PeerId` (device address of a correspondent)
//! - **Messaging**: `MessageId`, `MessageIdAllocator`
//! - **Correspondents**: `CorrespondentRecord`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Device address of a peer, as assigned by the hub transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id from a device address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The raw device address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no address was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for PeerId {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// CLUSTER B: MESSAGING
// =============================================================================

/// Identifier of one request/response exchange.
///
/// Only unique per process and per (sender, peer) pair inside the window of
/// outstanding requests; two processes may hand out the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// The numeric value carried on the wire.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Strictly increasing per-process message id counter.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    next: AtomicU64,
}

impl MessageIdAllocator {
    /// Create an allocator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create an allocator whose first id is `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> MessageId {
        MessageId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The id the next call to `next_id` will return.
    #[must_use]
    pub fn peek(&self) -> MessageId {
        MessageId(self.next.load(Ordering::Relaxed))
    }
}

// =============================================================================
// CLUSTER C: CORRESPONDENTS
// =============================================================================

/// A paired (or pairing) device as stored in `correspondent_devices`.
///
/// The schema belongs to the persistence layer; the messaging layer only
/// reads and writes it through the serialized query queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondentRecord {
    /// Device address used for point-to-point sends.
    #[serde(rename = "device_address")]
    pub peer_id: PeerId,
    /// Device public key (the first segment of a pairing code).
    #[serde(rename = "pubkey")]
    pub public_key: String,
    /// Hub the device is reachable through.
    pub hub: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Whether the pairing handshake completed.
    #[serde(default)]
    pub is_confirmed: bool,
}

impl CorrespondentRecord {
    /// An unconfirmed correspondent, as registered at the start of pairing.
    pub fn unconfirmed(
        peer_id: PeerId,
        public_key: impl Into<String>,
        hub: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            peer_id,
            public_key: public_key.into(),
            hub: hub.into(),
            name: name.into(),
            is_confirmed: false,
        }
    }

    /// The same record with the pairing marked complete.
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.is_confirmed = true;
        self
    }
}
