//! Fault Handling Tests
//!
//! - Endless conflicts end in RetriesExhausted, with nothing written
//! - A fatal store error halts every engine sharing the context
//! - Ordinary storage failures surface unchanged and do not halt
//! - A durable log whose tail is unknown halts writers and keeps its table

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use chronoset::model::{EntityId, EntityKind, Snapshot, SnapshotDraft, VersionId};
use chronoset::protocol::{
    EngineContext, FixedActor, ManualClock, RetryPolicy, VersionError, VersioningEngine,
};
use chronoset::service::Services;
use chronoset::store::{FileStore, MemoryStore, SnapshotStore, StoreError, StoreResult};

/// How the wrapped store's `commit` misbehaves.
#[derive(Clone, Copy)]
enum Fault {
    AlwaysConflict,
    Invariant,
    Unavailable,
}

/// A memory store whose `commit` fails on purpose.
struct FaultyStore {
    inner: MemoryStore,
    fault: Fault,
    commits: AtomicUsize,
}

impl FaultyStore {
    fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryStore::new(),
            fault,
            commits: AtomicUsize::new(0),
        }
    }
}

impl SnapshotStore for FaultyStore {
    fn allocate(&self) -> StoreResult<EntityId> {
        self.inner.allocate()
    }

    fn create(
        &self,
        content: String,
        created_at: DateTime<Utc>,
        created_by: String,
    ) -> StoreResult<Snapshot> {
        self.inner.create(content, created_at, created_by)
    }

    fn append(&self, draft: SnapshotDraft) -> StoreResult<VersionId> {
        self.inner.append(draft)
    }

    fn current(&self, entity_id: EntityId) -> StoreResult<Option<Snapshot>> {
        self.inner.current(entity_id)
    }

    fn by_version(&self, version_id: VersionId) -> StoreResult<Option<Snapshot>> {
        self.inner.by_version(version_id)
    }

    fn all_current(&self) -> StoreResult<Vec<Snapshot>> {
        self.inner.all_current()
    }

    fn history(&self, entity_id: EntityId) -> StoreResult<Vec<Snapshot>> {
        self.inner.history(entity_id)
    }

    fn retire(&self, version_id: VersionId, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.retire(version_id, at)
    }

    fn commit(&self, expected: VersionId, _draft: SnapshotDraft) -> StoreResult<VersionId> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Err(match self.fault {
            Fault::AlwaysConflict => {
                StoreError::conflict(format!("Snapshot {} is no longer current", expected))
            }
            Fault::Invariant => StoreError::invariant("Snapshot retired twice"),
            Fault::Unavailable => StoreError::unavailable("Disk went away"),
        })
    }

    fn entity_ids(&self) -> StoreResult<Vec<EntityId>> {
        self.inner.entity_ids()
    }
}

fn ctx(attempts: u32) -> EngineContext {
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()));
    EngineContext::new(clock, Arc::new(FixedActor::new("Billy")))
        .with_retry(RetryPolicy::immediate(attempts))
}

// =============================================================================
// Conflict exhaustion
// =============================================================================

/// A commit that always conflicts gives up after max_attempts.
#[test]
fn test_endless_conflicts_exhaust_retries() {
    let store = Arc::new(FaultyStore::new(Fault::AlwaysConflict));
    let engine = VersioningEngine::new(EntityKind::Post, store.clone(), ctx(5));
    let id = engine.create("p").unwrap().entity_id();

    let err = engine.edit(id, "never lands").unwrap_err();
    assert!(matches!(err, VersionError::RetriesExhausted { attempts: 5, .. }));
    assert_eq!(store.commits.load(Ordering::SeqCst), 5);
    assert_eq!(store.history(id).unwrap().len(), 1);

    let metrics = engine.context().metrics.snapshot();
    assert_eq!(metrics.commit_conflicts, 5);
    assert_eq!(metrics.retries_exhausted, 1);
    assert!(!engine.context().is_halted());
}

// =============================================================================
// Fatal halt
// =============================================================================

/// An invariant violation halts the engine and its siblings.
#[test]
fn test_invariant_violation_halts_shared_context() {
    let posts = Arc::new(FaultyStore::new(Fault::Invariant));
    let services = Services::new(posts.clone(), Arc::new(MemoryStore::new()), ctx(5));
    let post = services.posts.create("p").unwrap();
    let comment = services.comments.create("c").unwrap();

    let err = services.posts.edit(post.id, "boom").unwrap_err();
    assert!(matches!(err, VersionError::InvariantViolation(_)));
    // never retried
    assert_eq!(posts.commits.load(Ordering::SeqCst), 1);
    assert!(services.context().is_halted());

    assert!(matches!(
        services.comments.edit(comment.id, "after"),
        Err(VersionError::Halted)
    ));
    assert!(matches!(services.posts.create("q"), Err(VersionError::Halted)));

    // reads still work
    assert_eq!(services.comments.find_one(comment.id).unwrap().content, "c");
}

// =============================================================================
// Ordinary failures
// =============================================================================

/// A storage failure is surfaced and does not halt.
#[test]
fn test_storage_failure_surfaces_without_halt() {
    let store = Arc::new(FaultyStore::new(Fault::Unavailable));
    let engine = VersioningEngine::new(EntityKind::Comment, store.clone(), ctx(5));
    let id = engine.create("c").unwrap().entity_id();

    let err = engine.delete(id).unwrap_err();
    assert!(matches!(err, VersionError::Storage(_)));
    assert_eq!(store.commits.load(Ordering::SeqCst), 1);
    assert!(!engine.context().is_halted());
    assert_eq!(engine.context().metrics.snapshot().mutations_failed, 1);

    // the engine keeps serving
    assert!(engine.create("another").is_ok());
}

// =============================================================================
// Durable log failures
// =============================================================================

fn append_foreign_bytes(path: &std::path::Path) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(&[0x40, 0, 0, 0, 4, b'{']).unwrap();
}

/// A commit onto a log with unknown bytes at its tail is fatal, not Ok.
#[test]
fn test_commit_onto_unknown_tail_halts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("posts.log");
    let store = Arc::new(FileStore::open(&path).unwrap());
    let engine = VersioningEngine::new(EntityKind::Post, store.clone(), ctx(5));
    let post = engine.create("p").unwrap();

    append_foreign_bytes(&path);

    let err = engine.edit(post.entity_id(), "lost").unwrap_err();
    assert!(err.is_fatal());
    assert!(engine.context().is_halted());
    assert_eq!(store.history(post.entity_id()).unwrap().len(), 1);
    assert!(matches!(engine.edit(post.entity_id(), "again"), Err(VersionError::Halted)));
}

/// A create that cannot be persisted leaves no identifier behind.
#[test]
fn test_failed_create_issues_no_identifier() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("comments.log");
    let store = Arc::new(FileStore::open(&path).unwrap());
    let engine = VersioningEngine::new(EntityKind::Comment, store.clone(), ctx(5));
    let first = engine.create("kept").unwrap();

    append_foreign_bytes(&path);

    assert!(engine.create("dropped").unwrap_err().is_fatal());
    assert_eq!(store.entity_ids().unwrap(), vec![first.entity_id()]);
    assert!(store.current(EntityId::new(first.entity_id().value() + 1)).unwrap().is_none());
}
