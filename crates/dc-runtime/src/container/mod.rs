//! # Core Container
//!
//! Configuration and the explicit dependency container replacing
//! process-wide singletons.
//!
//! - Components built once, in dependency order (config → bus → database →
//!   correlator → protocol → dispatcher/responder)
//! - Configuration resolved from layered sources, missing keys fall back
//!   to defaults

pub mod config;
pub mod context;
pub mod sources;

pub use config::{BusConfig, ConfigError, CoreConfig, PaymentQueueConfig};
pub use context::CoreContext;
pub use sources::{env_var_name, ConfigSource, EnvSource, LayeredConfig, StaticSource};
