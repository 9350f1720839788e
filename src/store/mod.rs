//! Snapshot Store subsystem
//!
//! The store holds every revision of every entity of one kind. It is
//! append-only: snapshots are never rewritten except for the single
//! `valid_until` stamp that retires them, and nothing is ever removed.
//!
//! # Design Principles
//!
//! - Arena storage addressed by `VersionId`
//! - Exactly one current snapshot per identifier
//! - Conditional retire-then-append as one atomic `commit`
//! - Identifier issue plus first snapshot as one atomic `create`
//! - Checksummed, fsynced log for the durable store
//! - Halt-on-corruption: a damaged log refuses to open

mod allocator;
mod errors;
mod file;
mod log;
mod memory;
mod record;
mod table;

pub use allocator::{AllocatorError, IdentifierAllocator};
pub use errors::{Severity, StoreError, StoreErrorCode, StoreResult};
pub use file::FileStore;
pub use log::{LogReader, LogWriter};
pub use memory::MemoryStore;
pub use record::{compute_checksum, LogRecord, RecordKind};
pub use table::SnapshotTable;

use chrono::{DateTime, Utc};

use crate::model::{EntityId, Snapshot, SnapshotDraft, Timeline, VersionId};

/// Durable, uniquely-keyed snapshot storage for one entity kind.
///
/// Implementations serialize all writes of one store; `commit` is the only
/// way to move an identifier from one current snapshot to the next.
pub trait SnapshotStore: Send + Sync {
    /// Issue a new, never reused identifier.
    fn allocate(&self) -> StoreResult<EntityId>;

    /// Issue a new identifier with its first snapshot in one step.
    ///
    /// Either both happen or neither does.
    fn create(
        &self,
        content: String,
        created_at: DateTime<Utc>,
        created_by: String,
    ) -> StoreResult<Snapshot>;

    /// Append the first snapshot of a freshly allocated identifier.
    fn append(&self, draft: SnapshotDraft) -> StoreResult<VersionId>;

    /// Current snapshot of an identifier, if it has one.
    fn current(&self, entity_id: EntityId) -> StoreResult<Option<Snapshot>>;

    /// A snapshot by its version handle.
    fn by_version(&self, version_id: VersionId) -> StoreResult<Option<Snapshot>>;

    /// Current snapshots of all identifiers, newest `created_at` first.
    fn all_current(&self) -> StoreResult<Vec<Snapshot>>;

    /// All snapshots of one identifier, oldest first.
    fn history(&self, entity_id: EntityId) -> StoreResult<Vec<Snapshot>>;

    /// Stamp `valid_until` on a current snapshot.
    ///
    /// Retiring an already retired snapshot is an invariant violation.
    fn retire(&self, version_id: VersionId, at: DateTime<Utc>) -> StoreResult<()>;

    /// Atomically retire `expected` at `draft.created_at` and append `draft`.
    ///
    /// Returns a `Conflict` error when `expected` is no longer current.
    fn commit(&self, expected: VersionId, draft: SnapshotDraft) -> StoreResult<VersionId>;

    /// Every identifier with at least one snapshot, ascending.
    fn entity_ids(&self) -> StoreResult<Vec<EntityId>>;

    /// History of one identifier wrapped for invariant checks.
    fn timeline(&self, entity_id: EntityId) -> StoreResult<Timeline> {
        Ok(Timeline::new(entity_id, self.history(entity_id)?))
    }
}

/// Extract the assigned handle from an append or commit record.
fn appended_version(record: &LogRecord) -> StoreResult<VersionId> {
    match record {
        LogRecord::Append { snapshot } | LogRecord::Commit { snapshot, .. } => {
            Ok(snapshot.version_id())
        }
        other => Err(StoreError::invariant(format!(
            "Expected an append record, prepared {:?}",
            other.kind()
        ))),
    }
}

fn created_snapshot(record: LogRecord) -> StoreResult<Snapshot> {
    match record {
        LogRecord::Create { snapshot } => Ok(snapshot),
        other => Err(StoreError::invariant(format!(
            "Expected a create record, prepared {:?}",
            other.kind()
        ))),
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable("Lock poisoned")
}
