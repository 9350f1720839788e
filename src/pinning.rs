//! Reference pinning
//!
//! A parent never stores a live child identifier. Attaching a child freezes
//! the child's current `VersionId` into the parent's `child_refs`; later
//! edits or deletes of the child append new snapshots and leave the pinned
//! one untouched. Only a fresh attach moves the pin.
//!
//! `child_refs` is an ordered set keyed by child identifier: re-pinning a
//! child that is already present replaces its pin in place.

use serde::Serialize;

use crate::model::{EntityId, EntityKind, Snapshot, VersionId};
use crate::protocol::{VersionError, VersionResult};
use crate::store::SnapshotStore;

/// A child identifier together with the revision it was frozen at.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PinnedRef {
    pub entity_id: EntityId,
    pub version_id: VersionId,
}

/// Freeze the current revision of `child`.
///
/// A tombstoned child cannot be pinned.
pub fn pin_current(store: &dyn SnapshotStore, kind: EntityKind, child: EntityId) -> VersionResult<PinnedRef> {
    let current = store
        .current(child)?
        .ok_or(VersionError::NotFound { kind, id: child })?;

    if current.is_deleted() {
        return Err(VersionError::Deleted { kind, id: child });
    }

    Ok(PinnedRef {
        entity_id: child,
        version_id: current.version_id(),
    })
}

/// Return `refs` with `pin` inserted.
///
/// An earlier pin of the same child is replaced at its position; otherwise
/// the pin is appended.
pub fn pin_into(
    refs: &[VersionId],
    pin: PinnedRef,
    store: &dyn SnapshotStore,
    kind: EntityKind,
) -> VersionResult<Vec<VersionId>> {
    let mut pinned = Vec::with_capacity(refs.len() + 1);
    let mut replaced = false;

    for &version_id in refs {
        let child = resolve(store, kind, version_id)?;
        if child.entity_id() != pin.entity_id {
            pinned.push(version_id);
        } else if !replaced {
            pinned.push(pin.version_id);
            replaced = true;
        }
    }

    if !replaced {
        pinned.push(pin.version_id);
    }
    Ok(pinned)
}

/// Resolve a pinned handle to its frozen snapshot.
///
/// Pins are only ever taken from snapshots that exist and snapshots are never
/// removed, so a dangling pin means the history is broken.
pub fn resolve(store: &dyn SnapshotStore, kind: EntityKind, version_id: VersionId) -> VersionResult<Snapshot> {
    store.by_version(version_id)?.ok_or_else(|| {
        VersionError::InvariantViolation(format!("{} pin {} does not resolve", kind, version_id))
    })
}
