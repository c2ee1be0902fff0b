//! # Shared Bus - In-Process Event Bus
//!
//! Carries everything the device layer hears from the outside world to the
//! components waiting on it.
//!
//! ```text
//!   hub transport ──Text──▶ ┌──────────────┐ ──Protocol──▶ EventCorrelator
//!                           │  Event Bus   │
//!   InboundDispatcher ◀──── │              │ ──Protocol──▶ ConnectionResponder
//!            └──Protocol──▶ └──────────────┘
//! ```
//!
//! ## Rules
//!
//! - Events are typed (`BusEvent`); sender identity and message id are
//!   explicit fields, never parsed out of strings.
//! - Subscribers filter by topic, sender and event name (`EventFilter`).
//! - Dropping a `Subscription` unsubscribes it; the bus subscriber count is
//!   the observable proof that a listener was released.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BusEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
