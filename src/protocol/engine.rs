//! VersioningEngine - the retire-then-append protocol
//!
//! Every change to an existing identifier runs the same sequence:
//! 1. read the current snapshot (`NotFound` if there is none)
//! 2. compute the next revision from it
//! 3. `commit`: retire the snapshot read in step 1 and append the new one,
//!    atomically, only if it is still current
//! 4. on `Conflict` back off and start again from step 1
//!
//! The conditional retire in step 3 decides who wins on one identifier:
//! writers on the same identifier are ordered by whichever commits first.
//! Writers on different identifiers never conflict, but each store still
//! persists one record at a time, so they do queue for its log.
//!
//! A fatal store error halts every engine sharing the context: history that
//! broke an invariant is not extended further.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use uuid::Uuid;

use super::actor::ActorProvider;
use super::clock::Clock;
use super::errors::{VersionError, VersionResult};
use super::retry::{RetryPolicy, TombstonePolicy};
use crate::model::{EntityId, EntityKind, Snapshot, SnapshotDraft, VersionId};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::store::{SnapshotStore, StoreError};

/// Collaborators and policies shared by every engine of one process.
#[derive(Clone)]
pub struct EngineContext {
    pub clock: Arc<dyn Clock>,
    pub actor: Arc<dyn ActorProvider>,
    pub retry: RetryPolicy,
    pub tombstones: TombstonePolicy,
    pub metrics: Arc<MetricsRegistry>,
    halted: Arc<AtomicBool>,
}

impl EngineContext {
    pub fn new(clock: Arc<dyn Clock>, actor: Arc<dyn ActorProvider>) -> Self {
        Self {
            clock,
            actor,
            retry: RetryPolicy::default(),
            tombstones: TombstonePolicy::default(),
            metrics: Arc::new(MetricsRegistry::new()),
            halted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tombstone_policy(mut self, tombstones: TombstonePolicy) -> Self {
        self.tombstones = tombstones;
        self
    }

    /// True once any engine in this context hit a fatal error.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }
}

/// The next revision, as computed from the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub content: String,
    pub child_refs: Vec<VersionId>,
    pub deleted: bool,
}

impl Revision {
    /// Same content, pins and tombstone flag as `current`.
    pub fn carry(current: &Snapshot) -> Self {
        Self {
            content: current.content().to_string(),
            child_refs: current.child_refs().to_vec(),
            deleted: current.is_deleted(),
        }
    }
}

enum AttemptError {
    Conflict(StoreError),
    Failed(VersionError),
}

impl From<VersionError> for AttemptError {
    fn from(err: VersionError) -> Self {
        AttemptError::Failed(err)
    }
}

/// Versioning protocol for the identifiers of one store.
pub struct VersioningEngine {
    kind: EntityKind,
    store: Arc<dyn SnapshotStore>,
    ctx: EngineContext,
}

impl VersioningEngine {
    pub fn new(kind: EntityKind, store: Arc<dyn SnapshotStore>, ctx: EngineContext) -> Self {
        Self { kind, store, ctx }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Issue an identifier with its first snapshot, in one store write.
    pub fn create(&self, content: impl Into<String>) -> VersionResult<Snapshot> {
        self.ensure_running()?;
        let actor = self.ctx.actor.current_actor()?;

        let created = self
            .store
            .create(content.into(), self.ctx.clock.now(), actor)
            .map_err(VersionError::from);

        match created {
            Ok(snapshot) => {
                self.ctx.metrics.increment_entities_created();
                log_event_with_fields(
                    Event::EntityCreated,
                    &[
                        ("entity_id", &snapshot.entity_id().to_string()),
                        ("kind", self.kind.as_str()),
                        ("version_id", &snapshot.version_id().to_string()),
                    ],
                );
                Ok(snapshot)
            }
            Err(err) => Err(self.fail(err, None, "create")),
        }
    }

    /// Replace the content; keep pins.
    pub fn edit(&self, id: EntityId, content: impl Into<String>) -> VersionResult<Snapshot> {
        let content = content.into();
        self.mutate(id, "edit", |current| {
            self.check_live(current)?;
            Ok(Revision {
                content: content.clone(),
                child_refs: current.child_refs().to_vec(),
                deleted: false,
            })
        })
    }

    /// Rewrite the pin list; keep content.
    pub fn relink<F>(&self, id: EntityId, mut pins: F) -> VersionResult<Snapshot>
    where
        F: FnMut(&[VersionId]) -> VersionResult<Vec<VersionId>>,
    {
        self.mutate(id, "attach", |current| {
            self.check_live(current)?;
            Ok(Revision {
                content: current.content().to_string(),
                child_refs: pins(current.child_refs())?,
                deleted: false,
            })
        })
    }

    /// Append a tombstone.
    pub fn delete(&self, id: EntityId) -> VersionResult<Snapshot> {
        self.mutate(id, "delete", |current| {
            if current.is_deleted() {
                return Err(VersionError::Deleted {
                    kind: self.kind,
                    id,
                });
            }
            Ok(Revision {
                deleted: true,
                ..Revision::carry(current)
            })
        })
    }

    /// Append a live copy of a tombstoned revision.
    pub fn restore(&self, id: EntityId) -> VersionResult<Snapshot> {
        self.mutate(id, "restore", |current| {
            if !current.is_deleted() {
                return Err(VersionError::NotDeleted {
                    kind: self.kind,
                    id,
                });
            }
            Ok(Revision {
                deleted: false,
                ..Revision::carry(current)
            })
        })
    }

    /// Run the retire-then-append sequence until it commits.
    ///
    /// `transform` may run several times, once per attempt, each time against
    /// the then-current snapshot.
    pub fn mutate<F>(&self, id: EntityId, operation: &str, mut transform: F) -> VersionResult<Snapshot>
    where
        F: FnMut(&Snapshot) -> VersionResult<Revision>,
    {
        self.ensure_running()?;
        let actor = self.ctx.actor.current_actor()?;
        let op_id = Uuid::new_v4().to_string();
        let entity = id.to_string();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.attempt(id, &actor, &mut transform) {
                Ok(snapshot) => {
                    self.ctx.metrics.increment_snapshots_committed();
                    log_event_with_fields(
                        Event::SnapshotCommitted,
                        &[
                            ("attempt", &attempt.to_string()),
                            ("entity_id", &entity),
                            ("kind", self.kind.as_str()),
                            ("op_id", &op_id),
                            ("operation", operation),
                            ("version_id", &snapshot.version_id().to_string()),
                        ],
                    );
                    return Ok(snapshot);
                }
                Err(AttemptError::Conflict(err)) => {
                    self.ctx.metrics.increment_commit_conflicts();
                    log_event_with_fields(
                        Event::CommitConflict,
                        &[
                            ("attempt", &attempt.to_string()),
                            ("entity_id", &entity),
                            ("kind", self.kind.as_str()),
                            ("op_id", &op_id),
                            ("reason", err.message()),
                        ],
                    );
                    if attempt >= self.ctx.retry.max_attempts {
                        self.ctx.metrics.increment_retries_exhausted();
                        log_event_with_fields(
                            Event::RetriesExhausted,
                            &[
                                ("entity_id", &entity),
                                ("kind", self.kind.as_str()),
                                ("op_id", &op_id),
                            ],
                        );
                        return Err(VersionError::RetriesExhausted {
                            kind: self.kind,
                            id,
                            attempts: attempt,
                        });
                    }
                    let delay = self.ctx.retry.backoff(attempt);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(AttemptError::Failed(err)) => return Err(self.fail(err, Some(id), operation)),
            }
        }
    }

    fn attempt<F>(&self, id: EntityId, actor: &str, transform: &mut F) -> Result<Snapshot, AttemptError>
    where
        F: FnMut(&Snapshot) -> VersionResult<Revision>,
    {
        let current = self
            .store
            .current(id)
            .map_err(VersionError::from)?
            .ok_or(VersionError::NotFound {
                kind: self.kind,
                id,
            })?;

        let revision = transform(&current)?;
        let draft = SnapshotDraft {
            entity_id: id,
            content: revision.content,
            child_refs: revision.child_refs,
            created_at: self.ctx.clock.now(),
            created_by: actor.to_string(),
            deleted: revision.deleted,
        };

        match self.store.commit(current.version_id(), draft.clone()) {
            Ok(version_id) => Ok(Snapshot::from_draft(version_id, draft)),
            Err(err) if err.is_conflict() => Err(AttemptError::Conflict(err)),
            Err(err) => Err(AttemptError::Failed(err.into())),
        }
    }

    fn check_live(&self, current: &Snapshot) -> VersionResult<()> {
        if current.is_deleted() && self.ctx.tombstones == TombstonePolicy::RequireRestore {
            return Err(VersionError::Deleted {
                kind: self.kind,
                id: current.entity_id(),
            });
        }
        Ok(())
    }

    fn ensure_running(&self) -> VersionResult<()> {
        if self.ctx.is_halted() {
            log_event_with_fields(Event::EngineHalted, &[("kind", self.kind.as_str())]);
            return Err(VersionError::Halted);
        }
        Ok(())
    }

    /// Halt the context if `err` is fatal. Used by readers that find a
    /// broken history outside of a mutation.
    pub fn escalate(&self, err: VersionError, id: Option<EntityId>, operation: &str) -> VersionError {
        if err.is_fatal() && !matches!(err, VersionError::Halted) {
            self.ctx.halt();
            self.ctx.metrics.increment_invariant_violations();
            log_event_with_fields(
                Event::InvariantViolation,
                &[
                    ("entity_id", &id.map_or_else(String::new, |id| id.to_string())),
                    ("kind", self.kind.as_str()),
                    ("operation", operation),
                    ("reason", &err.to_string()),
                ],
            );
        }
        err
    }

    fn fail(&self, err: VersionError, id: Option<EntityId>, operation: &str) -> VersionError {
        if err.is_fatal() {
            return self.escalate(err, id, operation);
        }

        self.ctx.metrics.increment_mutations_failed();
        if let VersionError::Storage(_) = err {
            log_event_with_fields(
                Event::MutationFailed,
                &[
                    ("entity_id", &id.map_or_else(String::new, |id| id.to_string())),
                    ("kind", self.kind.as_str()),
                    ("operation", operation),
                    ("reason", &err.to_string()),
                ],
            );
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FixedActor, ManualClock};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn engine_with(policy: TombstonePolicy) -> VersioningEngine {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_000, 0).unwrap()));
        let ctx = EngineContext::new(clock, Arc::new(FixedActor::new("Billy")))
            .with_retry(RetryPolicy::immediate(3))
            .with_tombstone_policy(policy);
        VersioningEngine::new(EntityKind::Post, Arc::new(MemoryStore::new()), ctx)
    }

    fn engine() -> VersioningEngine {
        engine_with(TombstonePolicy::AllowUndelete)
    }

    #[test]
    fn test_create_appends_single_current_snapshot() {
        let engine = engine();
        let created = engine.create("My first post").unwrap();

        let history = engine.store().history(created.entity_id()).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_current());
        assert!(!history[0].is_deleted());
        assert_eq!(history[0].created_by(), "Billy");
    }

    #[test]
    fn test_edit_retires_previous_at_successor_creation() {
        let engine = engine();
        let created = engine.create("My first post").unwrap();
        let edited = engine.edit(created.entity_id(), "v2").unwrap();

        let first = engine.store().by_version(created.version_id()).unwrap().unwrap();
        assert_eq!(first.valid_until(), Some(edited.created_at()));
        assert_eq!(edited.content(), "v2");
    }

    #[test]
    fn test_edit_unknown_identifier_is_not_found() {
        let engine = engine();
        let err = engine.edit(EntityId::new(99), "nope").unwrap_err();
        assert!(matches!(err, VersionError::NotFound { .. }));
    }

    #[test]
    fn test_delete_then_edit_undeletes_by_default() {
        let engine = engine();
        let id = engine.create("p").unwrap().entity_id();
        assert!(engine.delete(id).unwrap().is_deleted());

        let revived = engine.edit(id, "back").unwrap();
        assert!(!revived.is_deleted());
    }

    #[test]
    fn test_require_restore_blocks_edit_of_tombstone() {
        let engine = engine_with(TombstonePolicy::RequireRestore);
        let id = engine.create("p").unwrap().entity_id();
        engine.delete(id).unwrap();

        let err = engine.edit(id, "back").unwrap_err();
        assert!(matches!(err, VersionError::Deleted { .. }));

        let restored = engine.restore(id).unwrap();
        assert!(!restored.is_deleted());
        assert_eq!(restored.content(), "p");
        assert_eq!(engine.edit(id, "back").unwrap().content(), "back");
    }

    #[test]
    fn test_double_delete_and_needless_restore_rejected() {
        let engine = engine();
        let id = engine.create("p").unwrap().entity_id();

        assert!(matches!(engine.restore(id), Err(VersionError::NotDeleted { .. })));
        engine.delete(id).unwrap();
        assert!(matches!(engine.delete(id), Err(VersionError::Deleted { .. })));
        assert_eq!(engine.store().history(id).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_actor_writes_nothing() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let ctx = EngineContext::new(clock, Arc::new(FixedActor::new("")));
        let engine = VersioningEngine::new(EntityKind::Comment, Arc::new(MemoryStore::new()), ctx);

        let err = engine.create("c").unwrap_err();
        assert!(matches!(err, VersionError::ActorUnavailable(_)));
        assert!(engine.store().entity_ids().unwrap().is_empty());
    }

    #[test]
    fn test_transform_error_aborts_without_commit() {
        let engine = engine();
        let id = engine.create("p").unwrap().entity_id();
        let err = engine
            .mutate(id, "custom", |_| Err(VersionError::ActorUnavailable("x".into())))
            .unwrap_err();
        assert!(matches!(err, VersionError::ActorUnavailable(_)));
        assert_eq!(engine.store().history(id).unwrap().len(), 1);
    }

    #[test]
    fn test_clock_regression_halts_engine() {
        let start = Utc.timestamp_opt(1_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let ctx = EngineContext::new(clock.clone(), Arc::new(FixedActor::new("Billy")));
        let engine = VersioningEngine::new(EntityKind::Post, Arc::new(MemoryStore::new()), ctx);

        let id = engine.create("p").unwrap().entity_id();
        clock.set(start);

        let err = engine.edit(id, "late").unwrap_err();
        assert!(matches!(err, VersionError::InvariantViolation(_)));
        assert!(engine.context().is_halted());
        assert_eq!(engine.context().metrics.snapshot().invariant_violations, 1);

        assert!(matches!(engine.create("another"), Err(VersionError::Halted)));
    }
}
