//! Bake queue counters for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one bake queue
#[derive(Debug, Default)]
pub struct BakeMetrics {
    /// Jobs not yet processed
    pending: AtomicUsize,
    baked_count: AtomicU64,
    /// Jobs rejected before resampling
    skipped_count: AtomicU64,
    /// Jobs whose sink commit failed
    failure_count: AtomicU64,
}

impl BakeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn set_pending(&self, pending: usize) {
        self.pending.store(pending, Ordering::Relaxed);
        observability::record_bake_queue_depth(pending);
    }

    pub fn baked_count(&self) -> u64 {
        self.baked_count.load(Ordering::Relaxed)
    }

    pub fn inc_baked(&self) {
        self.baked_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    pub fn inc_skipped(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pending: self.pending(),
            baked_count: self.baked_count(),
            skipped_count: self.skipped_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Point-in-time copy of [`BakeMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pending: usize,
    pub baked_count: u64,
    pub skipped_count: u64,
    pub failure_count: u64,
}
