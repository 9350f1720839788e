//! In-memory snapshot store
//!
//! A `SnapshotTable` behind an `RwLock`. The write lock spans validation and
//! application of each change, which is what makes `commit` atomic.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use super::record::LogRecord;
use super::table::SnapshotTable;
use super::{appended_version, created_snapshot, poisoned, SnapshotStore};
use crate::model::{EntityId, Snapshot, SnapshotDraft, VersionId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<SnapshotTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self, prepare: impl FnOnce(&SnapshotTable) -> StoreResult<LogRecord>) -> StoreResult<LogRecord> {
        let mut table = self.table.write().map_err(|_| poisoned())?;
        let record = prepare(&table)?;
        table.apply(&record)?;
        Ok(record)
    }

    fn read<T>(&self, f: impl FnOnce(&SnapshotTable) -> T) -> StoreResult<T> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(f(&table))
    }
}

impl SnapshotStore for MemoryStore {
    fn allocate(&self) -> StoreResult<EntityId> {
        match self.write(|t| t.prepare_allocate())? {
            LogRecord::Allocate { entity_id } => Ok(entity_id),
            other => Err(super::StoreError::invariant(format!(
                "Expected an allocate record, prepared {:?}",
                other.kind()
            ))),
        }
    }

    fn create(
        &self,
        content: String,
        created_at: DateTime<Utc>,
        created_by: String,
    ) -> StoreResult<Snapshot> {
        created_snapshot(self.write(|t| t.prepare_create(content, created_at, created_by))?)
    }

    fn append(&self, draft: SnapshotDraft) -> StoreResult<VersionId> {
        let record = self.write(|t| t.prepare_append(draft))?;
        appended_version(&record)
    }

    fn current(&self, entity_id: EntityId) -> StoreResult<Option<Snapshot>> {
        self.read(|t| t.current(entity_id).cloned())
    }

    fn by_version(&self, version_id: VersionId) -> StoreResult<Option<Snapshot>> {
        self.read(|t| t.get(version_id).cloned())
    }

    fn all_current(&self) -> StoreResult<Vec<Snapshot>> {
        self.read(|t| t.all_current())
    }

    fn history(&self, entity_id: EntityId) -> StoreResult<Vec<Snapshot>> {
        self.read(|t| t.history(entity_id))
    }

    fn retire(&self, version_id: VersionId, at: DateTime<Utc>) -> StoreResult<()> {
        self.write(|t| t.prepare_retire(version_id, at)).map(|_| ())
    }

    fn commit(&self, expected: VersionId, draft: SnapshotDraft) -> StoreResult<VersionId> {
        let record = self.write(|t| t.prepare_commit(expected, draft))?;
        appended_version(&record)
    }

    fn entity_ids(&self) -> StoreResult<Vec<EntityId>> {
        self.read(|t| t.entity_ids())
    }
}
