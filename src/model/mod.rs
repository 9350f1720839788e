//! Versioning domain types
//!
//! This module provides:
//! - `EntityId` - Permanent logical identifier
//! - `VersionId` - Handle of one immutable revision
//! - `EntityKind` - Which service a store belongs to
//! - `Snapshot` - Immutable, timestamped revision
//! - `SnapshotDraft` - Writer-side description of a new revision
//! - `Timeline` - Per-identifier history with invariant checks

mod ids;
mod snapshot;
mod timeline;

pub use ids::{EntityId, EntityKind, VersionId};
pub use snapshot::{Snapshot, SnapshotDraft};
pub use timeline::{Timeline, TimelineViolation};
