//! # Dagcoin Core Test Suite
//!
//! Integration flows across the coordination subsystems.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs       # Two in-process devices linked by in-memory hubs
//!     ├── flows.rs         # Pairing, request/response, legacy connection test
//!     └── coordination.rs  # Queue, retry and correlation properties
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p dc-tests
//! cargo test -p dc-tests integration::flows::
//! ```

pub mod integration;
