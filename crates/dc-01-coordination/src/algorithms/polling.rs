//! # Polling Loop
//!
//! Calls the same async method forever, sleeping after every run whether it
//! succeeded or not. Failures are logged and never stop the loop; only the
//! handle does.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Periodic runner of one method.
#[derive(Debug, Clone)]
pub struct PollingLoop {
    tag: String,
    sleep_time: Duration,
}

/// Controls a spawned [`PollingLoop`]. Dropping it stops the loop after
/// the current run.
pub struct PollingHandle {
    tag: String,
    stop: watch::Sender<bool>,
    runs: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl PollingLoop {
    /// Loop logging under `tag`, sleeping `sleep_time` after each run.
    pub fn new(tag: impl Into<String>, sleep_time: Duration) -> Self {
        Self {
            tag: tag.into(),
            sleep_time,
        }
    }

    /// Spawn the loop; the first run starts immediately.
    pub fn spawn<F, Fut, E>(self, mut method: F) -> PollingHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let runs = Arc::new(AtomicU64::new(0));
        let counter = runs.clone();
        let Self { tag, sleep_time } = self;
        let task_tag = tag.clone();

        let task = tokio::spawn(async move {
            loop {
                match method().await {
                    Ok(()) => trace!(tag = %task_tag, "Polling run completed"),
                    Err(e) => warn!(tag = %task_tag, error = %e, "Error with polling loop"),
                }
                counter.fetch_add(1, Ordering::Relaxed);

                tokio::select! {
                    _ = tokio::time::sleep(sleep_time) => {}
                    // A send or a dropped handle both end the loop.
                    _ = stopped.changed() => break,
                }
            }
            debug!(tag = %task_tag, "Polling loop stopped");
        });

        PollingHandle {
            tag,
            stop,
            runs,
            task,
        }
    }
}

impl PollingHandle {
    /// Completed runs so far.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Tag the loop logs under.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Stop the loop and wait for the current run to finish.
    pub async fn stop(self) {
        let Self { stop, task, .. } = self;
        let _ = stop.send(true);
        if let Err(e) = task.await {
            warn!(error = %e, "Polling task ended abnormally");
        }
    }
}
