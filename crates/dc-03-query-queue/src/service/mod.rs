//! Service layer for the query queue.

pub mod queued_database;

pub use queued_database::QueuedDatabase;
