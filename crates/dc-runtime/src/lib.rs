//! # Dagcoin Core Runtime
//!
//! Wires the coordination subsystems into one device.
//!
//! ## Modules
//!
//! - `container/` - `CoreConfig`, layered configuration sources, `CoreContext`
//!
//! The `dc-runtime` binary runs two in-process devices through a pairing
//! and connection check.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;

pub use container::{
    BusConfig, ConfigError, ConfigSource, CoreConfig, CoreContext, EnvSource, LayeredConfig,
    PaymentQueueConfig, StaticSource,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
