//! Versioning errors
//!
//! Error kinds surfaced by the protocol, the query layer and the services.
//! `Conflict` never appears here: a lost retire race is retried inside the
//! protocol and only escapes as `RetriesExhausted`.

use thiserror::Error;

use crate::model::{EntityId, EntityKind, VersionId};
use crate::store::{Severity, StoreError, StoreErrorCode};

/// Result type for versioning operations
pub type VersionResult<T> = Result<T, VersionError>;

#[derive(Debug, Error)]
pub enum VersionError {
    // ==================
    // Caller errors
    // ==================

    /// Identifier has no current snapshot
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    /// Requested version handle does not exist
    #[error("{kind} version {version} not found")]
    VersionNotFound { kind: EntityKind, version: VersionId },

    /// Identifier is tombstoned and the operation needs a live entity
    #[error("{kind} {id} is deleted")]
    Deleted { kind: EntityKind, id: EntityId },

    /// Restore of an identifier that is not tombstoned
    #[error("{kind} {id} is not deleted")]
    NotDeleted { kind: EntityKind, id: EntityId },

    // ==================
    // Environment errors
    // ==================

    /// Conflict retries were used up
    #[error("gave up on {kind} {id} after {attempts} conflicting attempts")]
    RetriesExhausted {
        kind: EntityKind,
        id: EntityId,
        attempts: u32,
    },

    /// No actor identity could be resolved for a mutating call
    #[error("actor unavailable: {0}")]
    ActorUnavailable(String),

    /// Underlying store failed. Fatal when the log itself can no longer be
    /// trusted, e.g. a failed fsync.
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),

    // ==================
    // Fatal errors
    // ==================

    /// History invariant broken; the atomicity contract with storage failed
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Mutations refused after an earlier invariant violation
    #[error("versioning engine halted after an invariant violation")]
    Halted,
}

impl VersionError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            VersionError::NotFound { .. } => "CHRONO_NOT_FOUND",
            VersionError::VersionNotFound { .. } => "CHRONO_VERSION_NOT_FOUND",
            VersionError::Deleted { .. } => "CHRONO_DELETED",
            VersionError::NotDeleted { .. } => "CHRONO_NOT_DELETED",
            VersionError::RetriesExhausted { .. } => "CHRONO_RETRIES_EXHAUSTED",
            VersionError::ActorUnavailable(_) => "CHRONO_ACTOR_UNAVAILABLE",
            VersionError::Storage(_) => "CHRONO_STORAGE_FAILURE",
            VersionError::InvariantViolation(_) => "CHRONO_INVARIANT_VIOLATION",
            VersionError::Halted => "CHRONO_HALTED",
        }
    }

    pub fn severity(&self) -> Severity {
        if self.is_fatal() {
            Severity::Fatal
        } else {
            Severity::Error
        }
    }

    /// Returns whether the process must stop trusting its history
    pub fn is_fatal(&self) -> bool {
        match self {
            VersionError::InvariantViolation(_) | VersionError::Halted => true,
            VersionError::Storage(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Returns whether the caller asked for something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VersionError::NotFound { .. } | VersionError::VersionNotFound { .. }
        )
    }
}

impl From<StoreError> for VersionError {
    fn from(err: StoreError) -> Self {
        match err.code() {
            StoreErrorCode::InvariantViolation | StoreErrorCode::Corruption => {
                VersionError::InvariantViolation(err.to_string())
            }
            _ => VersionError::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_store_errors_become_invariant_violations() {
        let err: VersionError = StoreError::invariant("retired twice").into();
        assert!(matches!(err, VersionError::InvariantViolation(_)));
        assert!(err.is_fatal());

        let err: VersionError = StoreError::corruption("bad checksum").into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ordinary_store_errors_stay_storage_failures() {
        let err: VersionError = StoreError::unavailable("Lock poisoned").into();
        assert!(matches!(err, VersionError::Storage(_)));
        assert!(!err.is_fatal());
        assert_eq!(err.code(), "CHRONO_STORAGE_FAILURE");
    }

    #[test]
    fn test_failed_fsync_is_fatal_storage_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "EIO");
        let err: VersionError = StoreError::sync_failed("fsync failed", io).into();
        assert!(matches!(err, VersionError::Storage(_)));
        assert!(err.is_fatal());
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_not_found_display() {
        let err = VersionError::NotFound {
            kind: EntityKind::Post,
            id: EntityId::new(4),
        };
        assert_eq!(err.to_string(), "post 4 not found");
        assert!(err.is_not_found());
        assert!(!err.is_fatal());
    }
}
