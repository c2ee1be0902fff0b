//! In-memory executor with scripted results, for tests and demos.

use crate::domain::{QueryCall, QueryError, Row};
use crate::ports::QueryExecutor;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Answers statements from per-statement scripts and records every call.
///
/// A statement with an exhausted (or missing) script returns no rows.
/// Concurrent executions are tracked so tests can assert serialization.
#[derive(Debug, Default)]
pub struct ScriptedQueryExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Result<Vec<Row>, QueryError>>>>,
    calls: Mutex<Vec<QueryCall>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedQueryExecutor {
    /// Executor answering instantly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that takes `latency` per statement.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queue `result` as the next answer to `statement`.
    pub fn push(&self, statement: &str, result: Result<Vec<Row>, QueryError>) {
        self.scripts
            .lock()
            .entry(statement.to_string())
            .or_default()
            .push_back(result);
    }

    /// Make the next `times` runs of `statement` fail with `error`.
    pub fn fail_times(&self, statement: &str, times: usize, error: QueryError) {
        for _ in 0..times {
            self.push(statement, Err(error.clone()));
        }
    }

    /// Every statement run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<QueryCall> {
        self.calls.lock().clone()
    }

    /// Highest number of statements that were running at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for ScriptedQueryExecutor {
    async fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>, QueryError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.calls
            .lock()
            .push(QueryCall::new(statement, params.to_vec()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let answer = self
            .scripts
            .lock()
            .get_mut(statement)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripts_are_consumed_in_order() {
        let executor = ScriptedQueryExecutor::new();
        executor.fail_times("SELECT 1", 1, QueryError::Unavailable("opening".into()));

        assert!(executor.query("SELECT 1", &[]).await.is_err());
        assert_eq!(executor.query("SELECT 1", &[]).await, Ok(Vec::new()));
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_records_parameters() {
        let executor = ScriptedQueryExecutor::new();
        executor.query("SELECT ?", &[json!(7)]).await.unwrap();

        assert_eq!(executor.calls()[0].params, vec![json!(7)]);
        assert_eq!(executor.max_in_flight(), 1);
    }
}
