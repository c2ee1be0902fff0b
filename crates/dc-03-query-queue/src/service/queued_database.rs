//! # Queued Database
//!
//! Every statement is funneled through one named [`SerialQueue`], so the
//! backend never sees two statements at once. Failed statements are
//! rejected to their caller; they are never requeued.

use crate::domain::{
    CorrespondentSummary, DatabaseConfig, DatabaseError, QueryCall, Row, StatementError,
    CORRESPONDENT_LIST, LOOKUP_DEVICE_BY_PUBKEY, READY_CHECK,
};
use crate::ports::QueryExecutor;
use dc_01_coordination::SerialQueue;
use serde_json::Value;
use shared_types::PeerId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Serialized access to the database.
#[derive(Clone)]
pub struct QueuedDatabase {
    executor: Arc<dyn QueryExecutor>,
    queue: SerialQueue<QueryCall, Vec<Row>, StatementError>,
    config: DatabaseConfig,
}

impl QueuedDatabase {
    /// Put `executor` behind a queue configured by `config`.
    pub fn new(executor: Arc<dyn QueryExecutor>, config: DatabaseConfig) -> Self {
        let backend = executor.clone();
        let queue = SerialQueue::new(
            config.queue_name.clone(),
            move |call: QueryCall| {
                let backend = backend.clone();
                async move {
                    backend
                        .query(&call.statement, &call.params)
                        .await
                        .map_err(|source| StatementError {
                            parameters: call.rendered_params(),
                            statement: call.statement,
                            source,
                        })
                }
            },
            config.queue_config(),
        );

        info!(queue = %config.queue_name, "Query queue created");

        Self {
            executor,
            queue,
            config,
        }
    }

    /// Run `statement` once every statement queued before it has settled.
    pub async fn query(
        &self,
        statement: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Row>, DatabaseError> {
        let call = QueryCall::new(statement, params);
        match self.queue.enqueue(call).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let error = DatabaseError::from(e);
                warn!(queue = %self.config.queue_name, error = %error, "Query failed");
                Err(error)
            }
        }
    }

    /// Wait until the backend answers `SELECT 1`, probing every
    /// `ready_check_interval`. Returns the number of probes made.
    ///
    /// The probe bypasses the queue and never gives up.
    pub async fn on_ready(&self) -> u32 {
        let mut probes = 0;
        loop {
            probes += 1;
            match self.executor.query(READY_CHECK, &[]).await {
                Ok(_) => {
                    debug!(probes, "Database ready");
                    return probes;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.config.ready_check_interval.as_secs(),
                        "Database not ready yet, retrying"
                    );
                    tokio::time::sleep(self.config.ready_check_interval).await;
                }
            }
        }
    }

    /// The confirmed correspondent owning `public_key`, if any.
    pub async fn lookup_device_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<Option<PeerId>, DatabaseError> {
        let rows = self
            .query(LOOKUP_DEVICE_BY_PUBKEY, vec![Value::from(public_key)])
            .await?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        match row.get("device_address").and_then(Value::as_str) {
            Some(address) => Ok(Some(PeerId::new(address))),
            None => Err(DatabaseError::Decode(
                "device_address missing from correspondent row".to_string(),
            )),
        }
    }

    /// All correspondents, most recently active first.
    pub async fn correspondent_list(&self) -> Result<Vec<CorrespondentSummary>, DatabaseError> {
        self.query(CORRESPONDENT_LIST, Vec::new())
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row))
                    .map_err(|e| DatabaseError::Decode(e.to_string()))
            })
            .collect()
    }

    /// Statements waiting behind the one in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The underlying queue.
    #[must_use]
    pub fn queue(&self) -> &SerialQueue<QueryCall, Vec<Row>, StatementError> {
        &self.queue
    }
}
