//! # Algorithms Module
//!
//! Bounded waits, retries, serialized execution and polling.

pub mod polling;
pub mod retry;
pub mod serial_queue;
pub mod timeout_guard;

pub use polling::{PollingHandle, PollingLoop};
pub use retry::{retry_timed, RetryScheduler};
pub use serial_queue::{QueueEntry, SerialQueue};
pub use timeout_guard::{timed, TimeoutGuard};
