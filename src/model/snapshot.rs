//! Snapshot - one immutable revision of an entity
//!
//! A snapshot is written once and never changes, with one exception: its
//! `valid_until` is stamped exactly once, when a successor supersedes it.
//! `valid_until == None` marks the current snapshot of its identifier.
//!
//! Deletion is an explicit tombstone snapshot, never physical removal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, VersionId};

/// Everything a writer decides about a new revision.
///
/// The store turns a draft into a `Snapshot` by assigning its `VersionId`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDraft {
    pub entity_id: EntityId,
    pub content: String,
    pub child_refs: Vec<VersionId>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub deleted: bool,
}

impl SnapshotDraft {
    /// Draft for the first revision of a freshly allocated identifier.
    pub fn initial(
        entity_id: EntityId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            entity_id,
            content: content.into(),
            child_refs: Vec::new(),
            created_at,
            created_by: created_by.into(),
            deleted: false,
        }
    }
}

/// A single immutable revision.
///
/// All fields are private to enforce immutability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    version_id: VersionId,
    entity_id: EntityId,
    content: String,
    child_refs: Vec<VersionId>,
    created_at: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    created_by: String,
    deleted: bool,
}

impl Snapshot {
    /// Materializes a draft under the version handle assigned by the store.
    pub fn from_draft(version_id: VersionId, draft: SnapshotDraft) -> Self {
        Self {
            version_id,
            entity_id: draft.entity_id,
            content: draft.content,
            child_refs: draft.child_refs,
            created_at: draft.created_at,
            valid_until: None,
            created_by: draft.created_by,
            deleted: draft.deleted,
        }
    }

    #[inline]
    pub fn version_id(&self) -> VersionId {
        self.version_id
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Pinned child snapshots, in attach order.
    #[inline]
    pub fn child_refs(&self) -> &[VersionId] {
        &self.child_refs
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    #[inline]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Returns true if this revision is a tombstone.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns true while no successor has superseded this revision.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }

    /// Stamps the end of this revision's validity.
    ///
    /// Only the store calls this, and only on a current snapshot.
    pub(crate) fn close(&mut self, at: DateTime<Utc>) {
        debug_assert!(self.valid_until.is_none());
        self.valid_until = Some(at);
    }
}
