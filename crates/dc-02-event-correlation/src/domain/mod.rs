//! Domain layer for event correlation.

pub mod errors;
pub mod stats;
pub mod token;

pub use errors::*;
pub use stats::*;
pub use token::*;
