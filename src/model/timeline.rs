//! Timeline - the full revision history of one identifier
//!
//! A timeline holds snapshots in ascending `created_at` order and can check
//! the two structural invariants of a history:
//! - exactly one snapshot is current, and it is the last one
//! - every retired snapshot is valid until the next one's `created_at`

use thiserror::Error;

use super::{EntityId, Snapshot, VersionId};

/// A broken history, as found by `Timeline::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineViolation {
    #[error("entity {0} has no snapshots")]
    Empty(EntityId),

    #[error("entity {entity} has {count} current snapshots")]
    CurrentCount { entity: EntityId, count: usize },

    #[error("snapshot {version} belongs to entity {found}, not {expected}")]
    ForeignSnapshot {
        version: VersionId,
        expected: EntityId,
        found: EntityId,
    },

    #[error("snapshot {version} is not strictly after its predecessor")]
    NotAscending { version: VersionId },

    #[error("snapshot {version} validity does not end where its successor begins")]
    Gap { version: VersionId },

    #[error("current snapshot {version} is not the latest revision")]
    CurrentNotLast { version: VersionId },
}

/// Ordered history of a single identifier.
#[derive(Clone, Debug)]
pub struct Timeline {
    entity_id: EntityId,
    snapshots: Vec<Snapshot>,
}

impl Timeline {
    /// Wraps a history that is already in ascending `created_at` order.
    pub fn new(entity_id: EntityId, snapshots: Vec<Snapshot>) -> Self {
        Self {
            entity_id,
            snapshots,
        }
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    #[inline]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// The snapshot with no retirement timestamp, if exactly one exists.
    pub fn current(&self) -> Option<&Snapshot> {
        let mut current = self.snapshots.iter().filter(|s| s.is_current());
        match (current.next(), current.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Checks the history against the timeline invariants.
    pub fn verify(&self) -> Result<(), TimelineViolation> {
        let Some(last) = self.snapshots.last() else {
            return Err(TimelineViolation::Empty(self.entity_id));
        };

        for snapshot in &self.snapshots {
            if snapshot.entity_id() != self.entity_id {
                return Err(TimelineViolation::ForeignSnapshot {
                    version: snapshot.version_id(),
                    expected: self.entity_id,
                    found: snapshot.entity_id(),
                });
            }
        }

        let current_count = self.snapshots.iter().filter(|s| s.is_current()).count();
        if current_count != 1 {
            return Err(TimelineViolation::CurrentCount {
                entity: self.entity_id,
                count: current_count,
            });
        }

        for pair in self.snapshots.windows(2) {
            let (earlier, later) = (&pair[0], &pair[1]);
            if later.created_at() <= earlier.created_at() {
                return Err(TimelineViolation::NotAscending {
                    version: later.version_id(),
                });
            }
            if earlier.is_current() {
                return Err(TimelineViolation::CurrentNotLast {
                    version: earlier.version_id(),
                });
            }
            if earlier.valid_until() != Some(later.created_at()) {
                return Err(TimelineViolation::Gap {
                    version: earlier.version_id(),
                });
            }
        }

        debug_assert!(last.is_current());
        Ok(())
    }
}
