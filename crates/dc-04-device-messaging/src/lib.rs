//! # DC-04 Device Messaging
//!
//! The Dagcoin protocol between paired devices.
//!
//! **Subsystem ID:** 4
//! **Architecture:** Hexagonal (Ports & Adapters)
//!
//! ## Responsibilities
//!
//! - Pairing by code (`<public key>@<hub>#<secret>`), reusing confirmed correspondents
//! - Correlated request/response over the hub transport
//! - Demultiplexing inbound payloads into `dagcoin.<title>` events
//! - Answering `is-connected` checks, including the legacy form
//!
//! ## Module Structure
//!
//! ```text
//! dc-04-device-messaging/
//! ├── domain/      # PairingCode, PairingState, MessagingConfig, errors
//! ├── ports/       # DeviceTransport, PairingPrimitives
//! ├── adapters/    # InMemoryHub, InMemoryPairing, InboundDispatcher, ConnectionResponder
//! └── service/     # MessageProtocol
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    ConnectionResponder, Dispatch, Handshake, InMemoryHub, InMemoryPairing, InboundDispatcher,
    SentMessage,
};
pub use domain::{
    ErrorContext, IdentityError, MessagingConfig, PairingCode, PairingState, ProtocolError,
    ReversePairingInfo, TransportError, DEFAULT_DEVICE_NAME, DEFAULT_MESSAGE_TIMEOUT,
    IS_CONNECTED, LEGACY_CONNECTED, LEGACY_IS_CONNECTED, PAIRING_CODE_PATTERN,
};
pub use ports::{Delivery, DeviceTransport, PairingPrimitives, SavedNotifier};
pub use service::MessageProtocol;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
