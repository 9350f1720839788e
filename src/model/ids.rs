//! Opaque handles for entities and their revisions
//!
//! - `EntityId` names a logical entity for its whole life
//! - `VersionId` names exactly one immutable snapshot
//!
//! Both are assigned by a store, never reused, and never derived from
//! content or wall-clock time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Permanent logical identifier of an entity.
///
/// Created once by the identifier allocator. A deleted entity keeps its
/// identifier so its history stays addressable.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates an identifier from its raw value.
    ///
    /// No Default implementation exists to prevent accidental construction.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of one immutable snapshot.
///
/// Version handles are arena slots: the store resolves them directly,
/// and pinned references hold them instead of a live `EntityId`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(u64);

impl VersionId {
    /// Creates a version handle from its raw value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The kind of entity a store holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        }
    }

    /// File name of this kind's snapshot log inside a data directory.
    pub fn log_file_name(&self) -> &'static str {
        match self {
            EntityKind::Post => "posts.log",
            EntityKind::Comment => "comments.log",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
