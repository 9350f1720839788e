//! Query Layer
//!
//! Read-side access over any `SnapshotStore`:
//! - `current` / `all_current` - live view per identifier
//! - `version` / `versions` - audit view of one revision or a full history
//! - `verify` / `verify_all` - timeline invariant checks
//!
//! Queries never take the write path and never observe a half-committed
//! transition: every store read runs under the store's read lock.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{EntityId, EntityKind, Snapshot, VersionId};
use crate::observability::{log_event_with_fields, Event};
use crate::protocol::{VersionError, VersionResult};
use crate::store::SnapshotStore;

/// An entity view together with the audit fields of the revision it came
/// from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityVersion<T> {
    #[serde(flatten)]
    pub entity: T,
    pub created_at: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl<T> EntityVersion<T> {
    pub fn new(entity: T, snapshot: &Snapshot) -> Self {
        Self {
            entity,
            created_at: snapshot.created_at(),
            valid_until: snapshot.valid_until(),
            created_by: snapshot.created_by().to_string(),
        }
    }

    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }
}

/// Current snapshot of `id`, tombstones included.
pub fn current(store: &dyn SnapshotStore, kind: EntityKind, id: EntityId) -> VersionResult<Snapshot> {
    store.current(id)?.ok_or(VersionError::NotFound { kind, id })
}

/// Current snapshots of every identifier, newest first.
///
/// Tombstones are dropped unless `include_deleted` is set.
pub fn all_current(store: &dyn SnapshotStore, include_deleted: bool) -> VersionResult<Vec<Snapshot>> {
    let mut snapshots = store.all_current()?;
    if !include_deleted {
        snapshots.retain(|s| !s.is_deleted());
    }
    Ok(snapshots)
}

/// One revision by its handle.
pub fn version(store: &dyn SnapshotStore, kind: EntityKind, version_id: VersionId) -> VersionResult<Snapshot> {
    store.by_version(version_id)?.ok_or(VersionError::VersionNotFound {
        kind,
        version: version_id,
    })
}

/// Every revision of `id`, oldest first.
pub fn versions(store: &dyn SnapshotStore, kind: EntityKind, id: EntityId) -> VersionResult<Vec<Snapshot>> {
    let history = store.history(id)?;
    if history.is_empty() {
        return Err(VersionError::NotFound { kind, id });
    }
    Ok(history)
}

/// Outcome of checking every timeline in one store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub kind: EntityKind,
    pub entities_checked: u64,
    pub snapshots_checked: u64,
    /// First broken invariant, if any. Checking stops there.
    pub violation: Option<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.violation.is_none()
    }
}

/// Check the timeline of one identifier.
pub fn verify(store: &dyn SnapshotStore, kind: EntityKind, id: EntityId) -> VersionResult<()> {
    let timeline = store.timeline(id)?;
    if timeline.is_empty() {
        return Err(VersionError::NotFound { kind, id });
    }
    timeline
        .verify()
        .map_err(|v| VersionError::InvariantViolation(format!("{} {}: {}", kind, id, v)))
}

/// Check every timeline in `store`.
pub fn verify_all(store: &dyn SnapshotStore, kind: EntityKind) -> VersionResult<VerifyReport> {
    let mut report = VerifyReport {
        kind,
        entities_checked: 0,
        snapshots_checked: 0,
        violation: None,
    };

    for id in store.entity_ids()? {
        let timeline = store.timeline(id)?;
        report.entities_checked += 1;
        report.snapshots_checked += timeline.len() as u64;

        if let Err(violation) = timeline.verify() {
            let reason = format!("{} {}: {}", kind, id, violation);
            log_event_with_fields(
                Event::VerifyFailed,
                &[("kind", kind.as_str()), ("reason", &reason)],
            );
            report.violation = Some(reason);
            return Ok(report);
        }
    }

    log_event_with_fields(
        Event::VerifyComplete,
        &[
            ("entities", &report.entities_checked.to_string()),
            ("kind", kind.as_str()),
            ("snapshots", &report.snapshots_checked.to_string()),
        ],
    );
    Ok(report)
}
