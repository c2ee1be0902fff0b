//! Service layer for event correlation.

pub mod correlator;

pub use correlator::{EventCorrelator, PendingResponse};
