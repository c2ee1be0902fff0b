//! Ports for device messaging.

pub mod outbound;

pub use outbound::{Delivery, DeviceTransport, PairingPrimitives, SavedNotifier};
