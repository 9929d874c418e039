use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Point-in-time view of a pool's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub queued: usize,
    pub submitted: usize,
    pub executed: usize,
    /// Detached jobs whose panic reached the worker loop.
    pub panicked: usize,
    /// Jobs dropped unrun by an abandoning shutdown.
    pub abandoned: usize,
}

impl PoolStats {
    /// Jobs accepted but neither finished nor abandoned yet.
    pub fn in_flight(&self) -> usize {
        self.submitted
            .saturating_sub(self.executed)
            .saturating_sub(self.abandoned)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicUsize,
    executed: AtomicUsize,
    panicked: AtomicUsize,
    abandoned: AtomicUsize,
}

impl Counters {
    pub(crate) fn on_submit(&self, n: usize) {
        self.submitted.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn on_rejected(&self, n: usize) {
        self.submitted.fetch_sub(n, Ordering::Relaxed);
    }

    pub(crate) fn on_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_abandoned(&self, n: usize) {
        self.abandoned.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, workers: usize, queued: usize) -> PoolStats {
        PoolStats {
            workers,
            queued,
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}
