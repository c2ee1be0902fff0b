//! Pairing codes and the pairing state machine.
//!
//! ```text
//! Unpaired → PairingInitiated → AwaitingReversePairing → PairingMessageSent → Paired
//!     └──────────────────────────────────────────────────────────────────────┘
//!                        (already a confirmed correspondent)
//! ```

use crate::domain::errors::ProtocolError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// `<public key>@<hub>#<pairing secret>`; the classes are ASCII word
/// characters plus the listed punctuation.
pub const PAIRING_CODE_PATTERN: &str =
    r"^([A-Za-z0-9_/+]+)@([A-Za-z0-9_.:/-]+)#([A-Za-z0-9_/+-]+)$";

static PAIRING_CODE: OnceLock<Regex> = OnceLock::new();

fn pairing_code_regex() -> &'static Regex {
    PAIRING_CODE.get_or_init(|| Regex::new(PAIRING_CODE_PATTERN).expect("valid pairing code regex"))
}

/// A parsed pairing code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairingCode {
    /// Device public key.
    pub public_key: String,
    /// Hub the device listens on.
    pub hub: String,
    /// One-time secret proving the code's owner invited us.
    pub pairing_secret: String,
}

impl PairingCode {
    /// Parse `code`, rejecting anything that does not match
    /// [`PAIRING_CODE_PATTERN`] as a whole.
    pub fn parse(code: &str) -> Result<Self, ProtocolError> {
        let captures = pairing_code_regex().captures(code).ok_or_else(|| {
            ProtocolError::MalformedInput(format!("INVALID PAIRING CODE: {code}"))
        })?;

        Ok(Self {
            public_key: captures[1].to_string(),
            hub: captures[2].to_string(),
            pairing_secret: captures[3].to_string(),
        })
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.public_key, self.hub, self.pairing_secret)
    }
}

/// Our own pairing secret, as handed out while waiting for the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversePairingInfo {
    /// Secret the peer must present back.
    pub pairing_secret: String,
}

/// Progress of one pairing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingState {
    /// Nothing done yet.
    Unpaired,
    /// Peer stored as an unconfirmed correspondent.
    PairingInitiated,
    /// Waiting for our own reverse pairing secret.
    AwaitingReversePairing,
    /// Handshake handed to the hub.
    PairingMessageSent,
    /// Confirmed correspondent.
    Paired,
}

impl PairingState {
    /// Whether `self → next` is a legal step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unpaired, Self::PairingInitiated)
                | (Self::Unpaired, Self::Paired)
                | (Self::PairingInitiated, Self::AwaitingReversePairing)
                | (Self::AwaitingReversePairing, Self::PairingMessageSent)
                | (Self::PairingMessageSent, Self::Paired)
        )
    }

    /// Step to `next`, or fail with `InvalidTransition`.
    pub fn transition(self, next: Self) -> Result<Self, ProtocolError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ProtocolError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// True once pairing completed.
    #[must_use]
    pub fn is_paired(self) -> bool {
        self == Self::Paired
    }
}
