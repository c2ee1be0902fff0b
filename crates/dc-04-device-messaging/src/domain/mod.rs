//! Domain layer for device messaging.

pub mod config;
pub mod errors;
pub mod pairing;

pub use config::*;
pub use errors::*;
pub use pairing::*;
