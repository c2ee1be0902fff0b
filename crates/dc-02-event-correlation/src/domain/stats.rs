//! Correlator counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters of one correlator.
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Waits opened.
    pub opened: AtomicU64,
    /// Waits resolved with a body.
    pub resolved: AtomicU64,
    /// Waits rejected by an application error.
    pub rejected: AtomicU64,
    /// Waits that hit their deadline.
    pub timed_out: AtomicU64,
    /// Events that reached a wait but did not match its sender or id.
    pub ignored: AtomicU64,
}

impl CorrelatorStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot as plain numbers `(opened, resolved, rejected, timed_out, ignored)`.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.opened.load(Ordering::Relaxed),
            self.resolved.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
            self.timed_out.load(Ordering::Relaxed),
            self.ignored.load(Ordering::Relaxed),
        )
    }
}
