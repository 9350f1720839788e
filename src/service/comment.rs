//! Comment service

use std::sync::Arc;

use serde::Serialize;

use crate::model::{EntityId, EntityKind, Snapshot, VersionId};
use crate::pinning::{self, PinnedRef};
use crate::protocol::{EngineContext, VersionResult, VersioningEngine};
use crate::query::{self, EntityVersion, VerifyReport};
use crate::store::SnapshotStore;

const KIND: EntityKind = EntityKind::Comment;

/// A comment as of one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: EntityId,
    pub version_id: VersionId,
    pub content: String,
    pub deleted: bool,
}

impl From<&Snapshot> for Comment {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.entity_id(),
            version_id: snapshot.version_id(),
            content: snapshot.content().to_string(),
            deleted: snapshot.is_deleted(),
        }
    }
}

pub type CommentVersion = EntityVersion<Comment>;

pub struct CommentService {
    engine: VersioningEngine,
}

impl CommentService {
    pub fn new(store: Arc<dyn SnapshotStore>, ctx: EngineContext) -> Self {
        Self {
            engine: VersioningEngine::new(KIND, store, ctx),
        }
    }

    pub fn create(&self, content: impl Into<String>) -> VersionResult<Comment> {
        self.engine.create(content).map(|s| Comment::from(&s))
    }

    pub fn edit(&self, id: EntityId, content: impl Into<String>) -> VersionResult<Comment> {
        self.engine.edit(id, content).map(|s| Comment::from(&s))
    }

    pub fn delete(&self, id: EntityId) -> VersionResult<Comment> {
        self.engine.delete(id).map(|s| Comment::from(&s))
    }

    pub fn restore(&self, id: EntityId) -> VersionResult<Comment> {
        self.engine.restore(id).map(|s| Comment::from(&s))
    }

    /// Current revision, tombstones included.
    pub fn find_one(&self, id: EntityId) -> VersionResult<Comment> {
        query::current(self.store(), KIND, id).map(|s| Comment::from(&s))
    }

    /// Every live comment, newest first.
    pub fn find_all(&self) -> VersionResult<Vec<Comment>> {
        self.list(false)
    }

    pub fn find_all_including_deleted(&self) -> VersionResult<Vec<Comment>> {
        self.list(true)
    }

    pub fn find_version(&self, version_id: VersionId) -> VersionResult<CommentVersion> {
        let snapshot = query::version(self.store(), KIND, version_id)?;
        Ok(EntityVersion::new(Comment::from(&snapshot), &snapshot))
    }

    /// Full history, oldest first.
    pub fn find_all_versions(&self, id: EntityId) -> VersionResult<Vec<CommentVersion>> {
        let history = query::versions(self.store(), KIND, id)?;
        Ok(history
            .iter()
            .map(|s| EntityVersion::new(Comment::from(s), s))
            .collect())
    }

    pub fn verify(&self) -> VersionResult<VerifyReport> {
        query::verify_all(self.store(), KIND)
    }

    pub fn engine(&self) -> &VersioningEngine {
        &self.engine
    }

    pub(crate) fn store(&self) -> &dyn SnapshotStore {
        self.engine.store()
    }

    pub(crate) fn pin(&self, id: EntityId) -> VersionResult<PinnedRef> {
        pinning::pin_current(self.store(), KIND, id)
    }

    /// The comment exactly as it was when pinned.
    pub(crate) fn resolve_pin(&self, version_id: VersionId) -> VersionResult<Comment> {
        pinning::resolve(self.store(), KIND, version_id)
            .map(|s| Comment::from(&s))
            .map_err(|e| self.engine.escalate(e, None, "resolve_pin"))
    }

    fn list(&self, include_deleted: bool) -> VersionResult<Vec<Comment>> {
        let snapshots = query::all_current(self.store(), include_deleted)?;
        Ok(snapshots.iter().map(Comment::from).collect())
    }
}
