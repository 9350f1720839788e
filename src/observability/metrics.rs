//! Versioning counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; exactness per counter, not across counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    entities_created: AtomicU64,
    snapshots_committed: AtomicU64,
    commit_conflicts: AtomicU64,
    retries_exhausted: AtomicU64,
    mutations_failed: AtomicU64,
    invariant_violations: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_entities_created(&self) {
        self.entities_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_snapshots_committed(&self) {
        self.snapshots_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commit_conflicts(&self) {
        self.commit_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_mutations_failed(&self) {
        self.mutations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invariant_violations(&self) {
        self.invariant_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters at once
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entities_created: self.entities_created.load(Ordering::Relaxed),
            snapshots_committed: self.snapshots_committed.load(Ordering::Relaxed),
            commit_conflicts: self.commit_conflicts.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            mutations_failed: self.mutations_failed.load(Ordering::Relaxed),
            invariant_violations: self.invariant_violations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub entities_created: u64,
    pub snapshots_committed: u64,
    pub commit_conflicts: u64,
    pub retries_exhausted: u64,
    pub mutations_failed: u64,
    pub invariant_violations: u64,
}
