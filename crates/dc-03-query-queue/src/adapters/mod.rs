//! Adapters for the query queue.

pub mod scripted;

pub use scripted::ScriptedQueryExecutor;
