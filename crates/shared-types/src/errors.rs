//! # Error Types
//!
//! Errors shared across subsystems.

use thiserror::Error;

/// Errors decoding or encoding a [`crate::MessageEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Payload is not JSON (plain chat text, usually).
    #[error("not a JSON message: {0}")]
    NotJson(String),

    /// JSON message for another protocol.
    #[error("unexpected protocol: {0}")]
    ForeignProtocol(String),

    /// Tagged `dagcoin` but does not match the envelope shape.
    #[error("invalid dagcoin envelope: {0}")]
    Invalid(String),
}
