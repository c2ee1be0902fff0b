//! # DC-02 Event Correlation
//!
//! Turns the broadcast, un-addressed protocol event stream into addressed,
//! one-shot awaitable replies keyed by `(event name, sender, message id)`.
//!
//! **Subsystem ID:** 2
//! **Architecture:** Hexagonal (domain + service)
//!
//! ## Guarantees
//!
//! - The bus subscription exists before `wait_for` returns
//! - Concurrent waits on one event name never settle each other
//! - Each wait releases its subscription exactly once, whatever the outcome
//! - At most one open wait per `(event, sender, message id)` triple
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pending = correlator.wait_for(
//!     EventName::response("is-connected"),
//!     peer.clone(),
//!     id,
//!     Duration::from_secs(30),
//!     "DID NOT RECEIVE A REPLY",
//! );
//! transport.send(...).await?;
//! let body = pending.await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod service;

// Re-exports
pub use domain::{
    CompletionChannelFactory, CompletionChannelId, CorrelationError, CorrelationToken,
    CorrelatorStats, WaitKey, COMPLETION_CHANNEL_PREFIX,
};
pub use service::{EventCorrelator, PendingResponse};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
