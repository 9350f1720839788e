//! Versioning services
//!
//! Posts and comments each live in their own snapshot store and run their
//! own `VersioningEngine`; they share one `EngineContext`, so a fatal error
//! in either halts both.

mod comment;
mod post;

pub use comment::{Comment, CommentService, CommentVersion};
pub use post::{Post, PostService, PostVersion};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::EntityKind;
use crate::protocol::{EngineContext, VersionResult};
use crate::query::VerifyReport;
use crate::store::{FileStore, MemoryStore, SnapshotStore, StoreResult};

/// Post and comment services wired to their stores.
pub struct Services {
    pub posts: PostService,
    pub comments: Arc<CommentService>,
    ctx: EngineContext,
}

impl Services {
    pub fn new(
        post_store: Arc<dyn SnapshotStore>,
        comment_store: Arc<dyn SnapshotStore>,
        ctx: EngineContext,
    ) -> Self {
        let comments = Arc::new(CommentService::new(comment_store, ctx.clone()));
        let posts = PostService::new(post_store, comments.clone(), ctx.clone());
        Self { posts, comments, ctx }
    }

    pub fn in_memory(ctx: EngineContext) -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()), ctx)
    }

    /// Services over already opened durable stores.
    pub fn durable(stores: FileStores, ctx: EngineContext) -> Self {
        Self::new(stores.posts, stores.comments, ctx)
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Check every timeline of both stores.
    pub fn verify(&self) -> VersionResult<Vec<VerifyReport>> {
        Ok(vec![self.posts.verify()?, self.comments.verify()?])
    }
}

/// The two durable stores of a data directory.
pub struct FileStores {
    pub posts: Arc<FileStore>,
    pub comments: Arc<FileStore>,
}

impl FileStores {
    /// Open (or create) `posts.log` and `comments.log` under `data_dir`.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        Ok(Self {
            posts: Arc::new(FileStore::open(&data_dir.join(EntityKind::Post.log_file_name()))?),
            comments: Arc::new(FileStore::open(&data_dir.join(EntityKind::Comment.log_file_name()))?),
        })
    }

    /// Newest `created_at` on record in either store.
    ///
    /// A restarted clock must not hand out anything earlier.
    pub fn newest_timestamp(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let newest = |store: &FileStore| -> StoreResult<Option<DateTime<Utc>>> {
            Ok(store.all_current()?.first().map(|s| s.created_at()))
        };
        Ok(newest(self.posts.as_ref())?.max(newest(self.comments.as_ref())?))
    }
}
