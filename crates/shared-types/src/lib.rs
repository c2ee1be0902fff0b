//! # Shared Types Crate
//!
//! Domain entities and the wire envelope exchanged between paired devices.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: peer identities, message identifiers and the
//!   `MessageEnvelope` are defined here and nowhere else.
//! - **Envelope Identity**: the sender of an inbound envelope is always taken
//!   from the transport, never from the payload.

pub mod entities;
pub mod envelope;
pub mod errors;

pub use entities::*;
pub use envelope::{EventName, MessageEnvelope, MessageType, PROTOCOL_TAG};
pub use errors::*;
