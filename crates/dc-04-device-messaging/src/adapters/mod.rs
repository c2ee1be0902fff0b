//! Adapters for device messaging.

pub mod dispatcher;
pub mod hub;
pub mod pairing;
pub mod responder;

pub use dispatcher::{Dispatch, InboundDispatcher};
pub use hub::{InMemoryHub, SentMessage};
pub use pairing::{Handshake, InMemoryPairing};
pub use responder::ConnectionResponder;
