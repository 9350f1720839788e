//! Post service
//!
//! Posts hold pinned comment revisions. A post view resolves each pin
//! against the comment store, so it shows comments exactly as they were
//! when attached.

use std::sync::Arc;

use serde::Serialize;

use super::comment::{Comment, CommentService};
use crate::model::{EntityId, EntityKind, Snapshot, VersionId};
use crate::pinning;
use crate::protocol::{EngineContext, VersionResult, VersioningEngine};
use crate::query::{self, EntityVersion, VerifyReport};
use crate::store::SnapshotStore;

const KIND: EntityKind = EntityKind::Post;

/// A post as of one revision, with its pinned comments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: EntityId,
    pub version_id: VersionId,
    pub content: String,
    pub comments: Vec<Comment>,
    pub deleted: bool,
}

pub type PostVersion = EntityVersion<Post>;

pub struct PostService {
    engine: VersioningEngine,
    comments: Arc<CommentService>,
}

impl PostService {
    pub fn new(store: Arc<dyn SnapshotStore>, comments: Arc<CommentService>, ctx: EngineContext) -> Self {
        Self {
            engine: VersioningEngine::new(KIND, store, ctx),
            comments,
        }
    }

    pub fn create(&self, content: impl Into<String>) -> VersionResult<Post> {
        let snapshot = self.engine.create(content)?;
        self.view(&snapshot)
    }

    pub fn edit(&self, id: EntityId, content: impl Into<String>) -> VersionResult<Post> {
        let snapshot = self.engine.edit(id, content)?;
        self.view(&snapshot)
    }

    /// Pin the current revision of `comment_id` into the post.
    ///
    /// Attaching a comment that is already pinned moves its pin forward.
    pub fn attach_comment(&self, id: EntityId, comment_id: EntityId) -> VersionResult<Post> {
        let pin = self.comments.pin(comment_id)?;
        let snapshot = self.engine.relink(id, |refs| {
            pinning::pin_into(refs, pin, self.comments.store(), EntityKind::Comment)
        })?;
        self.view(&snapshot)
    }

    pub fn delete(&self, id: EntityId) -> VersionResult<Post> {
        let snapshot = self.engine.delete(id)?;
        self.view(&snapshot)
    }

    pub fn restore(&self, id: EntityId) -> VersionResult<Post> {
        let snapshot = self.engine.restore(id)?;
        self.view(&snapshot)
    }

    /// Current revision, tombstones included.
    pub fn find_one(&self, id: EntityId) -> VersionResult<Post> {
        let snapshot = query::current(self.store(), KIND, id)?;
        self.view(&snapshot)
    }

    /// Every live post, newest first.
    pub fn find_all(&self) -> VersionResult<Vec<Post>> {
        self.list(false)
    }

    pub fn find_all_including_deleted(&self) -> VersionResult<Vec<Post>> {
        self.list(true)
    }

    pub fn find_version(&self, version_id: VersionId) -> VersionResult<PostVersion> {
        let snapshot = query::version(self.store(), KIND, version_id)?;
        Ok(EntityVersion::new(self.view(&snapshot)?, &snapshot))
    }

    /// Full history, oldest first.
    pub fn find_all_versions(&self, id: EntityId) -> VersionResult<Vec<PostVersion>> {
        query::versions(self.store(), KIND, id)?
            .iter()
            .map(|s| self.view(s).map(|post| EntityVersion::new(post, s)))
            .collect()
    }

    pub fn verify(&self) -> VersionResult<VerifyReport> {
        query::verify_all(self.store(), KIND)
    }

    pub fn engine(&self) -> &VersioningEngine {
        &self.engine
    }

    fn store(&self) -> &dyn SnapshotStore {
        self.engine.store()
    }

    fn list(&self, include_deleted: bool) -> VersionResult<Vec<Post>> {
        query::all_current(self.store(), include_deleted)?
            .iter()
            .map(|s| self.view(s))
            .collect()
    }

    fn view(&self, snapshot: &Snapshot) -> VersionResult<Post> {
        let comments = snapshot
            .child_refs()
            .iter()
            .map(|v| self.comments.resolve_pin(*v))
            .collect::<VersionResult<Vec<_>>>()?;

        Ok(Post {
            id: snapshot.entity_id(),
            version_id: snapshot.version_id(),
            content: snapshot.content().to_string(),
            comments,
            deleted: snapshot.is_deleted(),
        })
    }
}
