//! SnapshotTable - arena of immutable snapshots
//!
//! Snapshots live in a `Vec` indexed by `VersionId - 1`; nothing refers to a
//! snapshot except through its handle. Two indexes sit beside the arena:
//! the current version of each identifier and each identifier's history in
//! append order.
//!
//! Changes go through two steps. `prepare_*` validates a change against the
//! table and describes it as a `LogRecord`; `apply` performs a record. Stores
//! hold their write lock across both steps, and a durable store persists the
//! record in between. Replay feeds logged records straight to `apply`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::allocator::IdentifierAllocator;
use super::errors::{StoreError, StoreResult};
use super::record::LogRecord;
use crate::model::{EntityId, Snapshot, SnapshotDraft, Timeline, VersionId};

#[derive(Debug, Default)]
pub struct SnapshotTable {
    allocator: IdentifierAllocator,
    snapshots: Vec<Snapshot>,
    current: HashMap<EntityId, VersionId>,
    history: HashMap<EntityId, Vec<VersionId>>,
}

impl SnapshotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots ever appended.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Number of identifiers ever allocated.
    pub fn entity_count(&self) -> u64 {
        self.allocator.highest().map_or(0, |id| id.value())
    }

    // ==================
    // Reads
    // ==================

    pub fn get(&self, version_id: VersionId) -> Option<&Snapshot> {
        let slot = usize::try_from(version_id.value()).ok()?.checked_sub(1)?;
        self.snapshots.get(slot)
    }

    pub fn current(&self, entity_id: EntityId) -> Option<&Snapshot> {
        self.current.get(&entity_id).and_then(|v| self.get(*v))
    }

    /// All current snapshots, newest `created_at` first.
    pub fn all_current(&self) -> Vec<Snapshot> {
        let mut current: Vec<Snapshot> = self
            .current
            .values()
            .filter_map(|v| self.get(*v))
            .cloned()
            .collect();
        current.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then(b.version_id().cmp(&a.version_id()))
        });
        current
    }

    /// History of one identifier, oldest first.
    pub fn history(&self, entity_id: EntityId) -> Vec<Snapshot> {
        self.history
            .get(&entity_id)
            .map(|versions| versions.iter().filter_map(|v| self.get(*v)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn timeline(&self, entity_id: EntityId) -> Timeline {
        Timeline::new(entity_id, self.history(entity_id))
    }

    /// Every identifier that has at least one snapshot, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.history.keys().copied().collect();
        ids.sort();
        ids
    }

    // ==================
    // Prepare
    // ==================

    pub fn prepare_allocate(&self) -> StoreResult<LogRecord> {
        let entity_id = self
            .allocator
            .next_id()
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        Ok(LogRecord::Allocate { entity_id })
    }

    /// Issue the next identifier with its first snapshot.
    pub fn prepare_create(
        &self,
        content: String,
        created_at: DateTime<Utc>,
        created_by: String,
    ) -> StoreResult<LogRecord> {
        let entity_id = self
            .allocator
            .next_id()
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        let draft = SnapshotDraft::initial(entity_id, content, created_at, created_by);
        let snapshot = Snapshot::from_draft(self.next_version_id(), draft);
        Ok(LogRecord::Create { snapshot })
    }

    pub fn prepare_append(&self, draft: SnapshotDraft) -> StoreResult<LogRecord> {
        self.check_append(&draft)?;
        let snapshot = Snapshot::from_draft(self.next_version_id(), draft);
        Ok(LogRecord::Append { snapshot })
    }

    pub fn prepare_retire(&self, version_id: VersionId, at: DateTime<Utc>) -> StoreResult<LogRecord> {
        self.check_retire(version_id, at)?;
        Ok(LogRecord::Retire { version_id, at })
    }

    /// Validate a conditional retire-then-append.
    ///
    /// `expected` no longer being current is a `Conflict`, not an invariant
    /// violation: another writer got there first.
    pub fn prepare_commit(&self, expected: VersionId, draft: SnapshotDraft) -> StoreResult<LogRecord> {
        let current = self.current.get(&draft.entity_id).copied();
        if current != Some(expected) {
            let found = current.map_or_else(|| "none".to_string(), |v| v.to_string());
            return Err(StoreError::conflict(format!(
                "Snapshot {} is no longer current for entity {}",
                expected, draft.entity_id
            ))
            .with_details(format!("current: {}", found)));
        }
        self.check_retire(expected, draft.created_at)?;
        let snapshot = Snapshot::from_draft(self.next_version_id(), draft);
        Ok(LogRecord::Commit {
            retired: expected,
            snapshot,
        })
    }

    // ==================
    // Apply
    // ==================

    /// Perform one change. Every record is re-validated.
    pub fn apply(&mut self, record: &LogRecord) -> StoreResult<()> {
        match record {
            LogRecord::Allocate { entity_id } => self.mark_allocated(*entity_id),
            LogRecord::Create { snapshot } => {
                self.check_slot(snapshot)?;
                self.mark_allocated(snapshot.entity_id())?;
                self.push(snapshot.clone());
                Ok(())
            }
            LogRecord::Append { snapshot } => {
                self.check_slot(snapshot)?;
                self.check_append(&draft_of(snapshot))?;
                self.push(snapshot.clone());
                Ok(())
            }
            LogRecord::Retire { version_id, at } => {
                self.check_retire(*version_id, *at)?;
                self.close(*version_id, *at);
                Ok(())
            }
            LogRecord::Commit { retired, snapshot } => {
                self.check_slot(snapshot)?;
                if self.current.get(&snapshot.entity_id()) != Some(retired) {
                    return Err(StoreError::invariant(format!(
                        "Commit retires {} which is not current for entity {}",
                        retired,
                        snapshot.entity_id()
                    )));
                }
                self.check_retire(*retired, snapshot.created_at())?;
                self.close(*retired, snapshot.created_at());
                self.push(snapshot.clone());
                Ok(())
            }
        }
    }

    // ==================
    // Checks
    // ==================

    fn mark_allocated(&mut self, entity_id: EntityId) -> StoreResult<()> {
        self.allocator
            .mark_allocated(entity_id)
            .map_err(|e| StoreError::invariant(e.to_string()))
    }

    fn next_version_id(&self) -> VersionId {
        VersionId::new(self.snapshots.len() as u64 + 1)
    }

    fn check_slot(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let expected = self.next_version_id();
        if snapshot.version_id() != expected {
            return Err(StoreError::invariant(format!(
                "Snapshot {} appended into slot {}",
                snapshot.version_id(),
                expected
            )));
        }
        Ok(())
    }

    fn check_append(&self, draft: &SnapshotDraft) -> StoreResult<()> {
        if !self.allocator.is_allocated(draft.entity_id) {
            return Err(StoreError::not_found(format!(
                "Entity {} was never allocated",
                draft.entity_id
            )));
        }
        if let Some(existing) = self.current.get(&draft.entity_id) {
            return Err(StoreError::invariant(format!(
                "Entity {} already has current snapshot {}",
                draft.entity_id, existing
            )));
        }
        Ok(())
    }

    fn check_retire(&self, version_id: VersionId, at: DateTime<Utc>) -> StoreResult<()> {
        let snapshot = self
            .get(version_id)
            .ok_or_else(|| StoreError::not_found(format!("Snapshot {} does not exist", version_id)))?;
        if !snapshot.is_current() {
            return Err(StoreError::invariant(format!(
                "Snapshot {} is already retired",
                version_id
            )));
        }
        if at <= snapshot.created_at() {
            return Err(StoreError::invariant(format!(
                "Retire time {} is not after creation time {} of snapshot {}",
                at,
                snapshot.created_at(),
                version_id
            )));
        }
        Ok(())
    }

    fn push(&mut self, snapshot: Snapshot) {
        let entity_id = snapshot.entity_id();
        let version_id = snapshot.version_id();
        self.snapshots.push(snapshot);
        self.current.insert(entity_id, version_id);
        self.history.entry(entity_id).or_default().push(version_id);
    }

    fn close(&mut self, version_id: VersionId, at: DateTime<Utc>) {
        let slot = version_id.value() as usize - 1;
        let entity_id = self.snapshots[slot].entity_id();
        self.snapshots[slot].close(at);
        if self.current.get(&entity_id) == Some(&version_id) {
            self.current.remove(&entity_id);
        }
    }
}

fn draft_of(snapshot: &Snapshot) -> SnapshotDraft {
    SnapshotDraft {
        entity_id: snapshot.entity_id(),
        content: snapshot.content().to_string(),
        child_refs: snapshot.child_refs().to_vec(),
        created_at: snapshot.created_at(),
        created_by: snapshot.created_by().to_string(),
        deleted: snapshot.is_deleted(),
    }
}
