//! # Domain Module
//!
//! Errors, retry budgets and queue settings.

pub mod budget;
pub mod config;
pub mod errors;

pub use budget::*;
pub use config::*;
pub use errors::*;
