//! # DC-01 Coordination
//!
//! Asynchronous coordination primitives shared by every other subsystem.
//!
//! **Subsystem ID:** 1
//! **Architecture:** Hexagonal (domain + algorithms)
//!
//! ## Purpose
//!
//! - `timed` / `TimeoutGuard`: race one operation against one timer
//! - `retry_timed` / `RetryScheduler`: re-issue an operation while it times out
//! - `SerialQueue`: at most one in-flight operation per named resource
//! - `PollingLoop`: call a method forever with a pause between runs
//!
//! ## Module Structure
//!
//! ```text
//! dc-01-coordination/
//! ├── domain/          # CoordinationError, QueueError, RetryBudget, QueueConfig
//! └── algorithms/      # timeout guard, retry, serial queue, polling
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;

// Re-exports
pub use algorithms::{
    retry_timed, timed, PollingHandle, PollingLoop, QueueEntry, RetryScheduler, SerialQueue,
    TimeoutGuard,
};
pub use domain::{
    Attempts, CoordinationError, QueueConfig, QueueError, RequeuePolicy, RetryBudget,
    DEFAULT_FINAL_TIMEOUT_MESSAGE, DEFAULT_GUARD_MESSAGE, DEFAULT_TIMEOUT_MESSAGE,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
