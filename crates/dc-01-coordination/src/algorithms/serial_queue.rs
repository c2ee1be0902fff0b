//! # Serial Queue
//!
//! Named FIFO of pending operations against one shared resource. At most
//! one operation runs at a time; the next starts only after the previous
//! one settled and the optional cooldown elapsed.
//!
//! ## Scheduling
//!
//! ```text
//! enqueue ──push──▶ [e3, e2, e1] ──pop head──▶ execute(e1)
//!                        ▲                        │
//!                        └── requeue (tail) ◀─────┤ failure + UntilSuccess
//!                                                 │
//!                     resolve / reject ◀──────────┘
//!                     cooldown, clear "executing", schedule again
//! ```

use crate::domain::{QueueConfig, QueueError};
use dc_telemetry::{log_event, HistogramTimer, QUEUE_EXECUTIONS};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

type BoxedOperation<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;
type Execute<A, T, E> = dyn Fn(A) -> BoxedOperation<T, E> + Send + Sync;

/// One pending operation.
pub struct QueueEntry<A, T, E> {
    /// Arguments handed to the execute function (cloned per attempt).
    pub arguments: A,
    /// Diagnostic sequence number, unique per queue.
    pub sequence: u64,
    /// Failed executions so far.
    pub attempts: u32,
    resolver: oneshot::Sender<Result<T, QueueError<E>>>,
}

struct QueueState<A, T, E> {
    pending: VecDeque<QueueEntry<A, T, E>>,
    executing: bool,
    next_sequence: u64,
}

struct QueueInner<A, T, E> {
    name: String,
    config: QueueConfig,
    execute: Box<Execute<A, T, E>>,
    state: Mutex<QueueState<A, T, E>>,
}

/// Serializes calls to one execute function.
///
/// Cloning yields another handle to the same queue.
pub struct SerialQueue<A, T, E> {
    inner: Arc<QueueInner<A, T, E>>,
}

impl<A, T, E> Clone for SerialQueue<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T, E> SerialQueue<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create a queue named `name` running `execute` for each entry.
    pub fn new<F, Fut>(name: impl Into<String>, execute: F, config: QueueConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let boxed: Box<Execute<A, T, E>> =
            Box::new(move |args: A| -> BoxedOperation<T, E> { Box::pin(execute(args)) });

        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                config,
                execute: boxed,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    executing: false,
                    next_sequence: 0,
                }),
            }),
        }
    }

    /// Append an operation and trigger scheduling.
    ///
    /// The push happens before this returns; the returned future settles
    /// with the operation's outcome. Must be called from within a Tokio
    /// runtime.
    pub fn enqueue(
        &self,
        arguments: A,
    ) -> impl Future<Output = Result<T, QueueError<E>>> + Send + 'static {
        let (resolver, outcome) = oneshot::channel();

        {
            let mut state = self.inner.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.pending.push_back(QueueEntry {
                arguments,
                sequence,
                attempts: 0,
                resolver,
            });
            trace!(
                queue = %self.inner.name,
                sequence,
                pending = state.pending.len(),
                "Entry enqueued"
            );
        }

        self.inner.schedule();

        let queue = self.inner.name.clone();
        async move {
            match outcome.await {
                Ok(settled) => settled,
                Err(_) => Err(QueueError::Closed { queue }),
            }
        }
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Entries waiting to run (excluding the one executing).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// True when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while an operation (or its cooldown) is in progress.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.inner.state.lock().executing
    }

    /// Settings this queue was built with.
    #[must_use]
    pub fn config(&self) -> QueueConfig {
        self.inner.config
    }
}

impl<A, T, E> QueueInner<A, T, E>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Start the head entry unless the queue is empty or busy.
    fn schedule(self: &Arc<Self>) {
        let entry = {
            let mut state = self.state.lock();

            if state.executing {
                trace!(queue = %self.name, "Queue busy");
                return;
            }

            let Some(entry) = state.pending.pop_front() else {
                trace!(queue = %self.name, "Queue free");
                return;
            };

            state.executing = true;
            entry
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run(entry).await;
        });
    }

    async fn run(self: Arc<Self>, mut entry: QueueEntry<A, T, E>) {
        log_event!(
            debug,
            "serial-queue",
            "Executing queued operation",
            queue = %self.name,
            sequence = entry.sequence,
            attempt = entry.attempts + 1
        );

        let arguments = entry.arguments.clone();
        let outcome = {
            let _timer = HistogramTimer::for_queue(&self.name);
            let inner = Arc::clone(&self);
            // Building and running the operation both happen in their own
            // task, so a panic in either cannot wedge the queue.
            tokio::spawn(async move { (inner.execute)(arguments).await }).await
        };

        match outcome {
            Ok(Ok(value)) => {
                QUEUE_EXECUTIONS
                    .with_label_values(&[self.name.as_str(), "resolved"])
                    .inc();
                if entry.resolver.send(Ok(value)).is_err() {
                    trace!(queue = %self.name, sequence = entry.sequence, "Enqueuer gone");
                }
            }
            Ok(Err(failure)) => {
                entry.attempts += 1;

                if self.config.requeue.requeues_after(entry.attempts) {
                    QUEUE_EXECUTIONS
                        .with_label_values(&[self.name.as_str(), "requeued"])
                        .inc();
                    log_event!(
                        warn,
                        "serial-queue",
                        "Queued operation failed, requeued at the tail",
                        queue = %self.name,
                        sequence = entry.sequence,
                        attempts = entry.attempts,
                        error = %failure
                    );
                    self.state.lock().pending.push_back(entry);
                } else {
                    QUEUE_EXECUTIONS
                        .with_label_values(&[self.name.as_str(), "rejected"])
                        .inc();
                    debug!(
                        queue = %self.name,
                        sequence = entry.sequence,
                        error = %failure,
                        "Queued operation rejected"
                    );
                    let rejection = QueueError::Rejected {
                        queue: self.name.clone(),
                        sequence: entry.sequence,
                        error: failure,
                    };
                    if entry.resolver.send(Err(rejection)).is_err() {
                        trace!(queue = %self.name, sequence = entry.sequence, "Enqueuer gone");
                    }
                }
            }
            Err(join_error) => {
                QUEUE_EXECUTIONS
                    .with_label_values(&[self.name.as_str(), "panicked"])
                    .inc();
                error!(
                    queue = %self.name,
                    sequence = entry.sequence,
                    error = %join_error,
                    "Queued operation panicked"
                );
                // Dropping the entry settles the enqueuer with `Closed`.
                drop(entry);
            }
        }

        if let Some(delay) = self.config.minimum_delay.filter(|d| !d.is_zero()) {
            debug!(queue = %self.name, delay_ms = delay.as_millis() as u64, "Cooling down");
            tokio::time::sleep(delay).await;
        }

        self.state.lock().executing = false;
        self.schedule();
    }
}
