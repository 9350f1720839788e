//! Snapshot store error types
//!
//! Error codes:
//! - CHRONO_STORE_IO_ERROR (ERROR severity)
//! - CHRONO_STORE_WRITE_FAILED (ERROR severity)
//! - CHRONO_STORE_SYNC_FAILED (FATAL severity)
//! - CHRONO_STORE_READ_FAILED (ERROR severity)
//! - CHRONO_STORE_NOT_FOUND (ERROR severity)
//! - CHRONO_STORE_CONFLICT (ERROR severity, retried by the protocol)
//! - CHRONO_STORE_UNAVAILABLE (ERROR severity)
//! - CHRONO_STORE_CORRUPTION (FATAL severity)
//! - CHRONO_STORE_INVARIANT (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, process continues
    Error,
    /// History can no longer be trusted; writers must halt
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Disk I/O failure
    IoError,
    /// Log record write failed and was rolled back
    WriteFailed,
    /// fsync or rollback failed; the log tail is in an unknown state
    SyncFailed,
    /// Log record read failed
    ReadFailed,
    /// Identifier or version unknown to the store
    NotFound,
    /// Conditional retire lost the race against another writer
    Conflict,
    /// Store cannot serve the call (poisoned lock, exhausted handles)
    Unavailable,
    /// Log checksum or framing failure
    Corruption,
    /// A history invariant would be (or was) broken
    InvariantViolation,
}

impl StoreErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::IoError => "CHRONO_STORE_IO_ERROR",
            StoreErrorCode::WriteFailed => "CHRONO_STORE_WRITE_FAILED",
            StoreErrorCode::SyncFailed => "CHRONO_STORE_SYNC_FAILED",
            StoreErrorCode::ReadFailed => "CHRONO_STORE_READ_FAILED",
            StoreErrorCode::NotFound => "CHRONO_STORE_NOT_FOUND",
            StoreErrorCode::Conflict => "CHRONO_STORE_CONFLICT",
            StoreErrorCode::Unavailable => "CHRONO_STORE_UNAVAILABLE",
            StoreErrorCode::Corruption => "CHRONO_STORE_CORRUPTION",
            StoreErrorCode::InvariantViolation => "CHRONO_STORE_INVARIANT",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::SyncFailed
            | StoreErrorCode::Corruption
            | StoreErrorCode::InvariantViolation => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error with full context
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StoreError {
    fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a new store I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StoreErrorCode::IoError, message)
        }
    }

    /// Create a new write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StoreErrorCode::WriteFailed, message)
        }
    }

    /// Create a sync failed error (FATAL)
    pub fn sync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StoreErrorCode::SyncFailed, message)
        }
    }

    /// Create a new read failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StoreErrorCode::ReadFailed, message)
        }
    }

    /// Identifier or version is unknown
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::NotFound, message)
    }

    /// The expected current snapshot was already superseded
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Conflict, message)
    }

    /// The store cannot serve the call
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Unavailable, message)
    }

    /// Create a new corruption error (FATAL)
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Corruption, message)
    }

    /// Create a corruption error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("byte_offset: {}", offset)),
            ..Self::new(StoreErrorCode::Corruption, reason)
        }
    }

    /// Create an invariant violation (FATAL)
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::InvariantViolation, message)
    }

    /// Attach extra context to this error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns whether this error is a lost retire race
    pub fn is_conflict(&self) -> bool {
        self.code == StoreErrorCode::Conflict
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StoreErrorCode::IoError.code(), "CHRONO_STORE_IO_ERROR");
        assert_eq!(StoreErrorCode::Conflict.code(), "CHRONO_STORE_CONFLICT");
        assert_eq!(StoreErrorCode::Corruption.code(), "CHRONO_STORE_CORRUPTION");
        assert_eq!(StoreErrorCode::InvariantViolation.code(), "CHRONO_STORE_INVARIANT");
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(StoreErrorCode::Conflict.severity(), Severity::Error);
        assert_eq!(StoreErrorCode::NotFound.severity(), Severity::Error);
        assert_eq!(StoreErrorCode::WriteFailed.severity(), Severity::Error);
        assert_eq!(StoreErrorCode::SyncFailed.severity(), Severity::Fatal);
        assert_eq!(StoreErrorCode::Corruption.severity(), Severity::Fatal);
        assert_eq!(StoreErrorCode::InvariantViolation.severity(), Severity::Fatal);
    }

    #[test]
    fn test_conflict_is_not_fatal() {
        let err = StoreError::conflict("v3 already retired");
        assert!(err.is_conflict());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_invariant_is_fatal() {
        let err = StoreError::invariant("retire of retired snapshot");
        assert!(err.is_fatal());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_display_contains_context() {
        let err = StoreError::corruption_at_offset(512, "checksum mismatch");
        let display = format!("{}", err);
        assert!(display.contains("CHRONO_STORE_CORRUPTION"));
        assert!(display.contains("FATAL"));
        assert!(display.contains("checksum mismatch"));
        assert!(display.contains("byte_offset: 512"));
    }

    #[test]
    fn test_io_source_preserved() {
        use std::error::Error;
        let err = StoreError::write_failed("disk full", io::Error::new(io::ErrorKind::Other, "full"));
        assert!(err.source().is_some());
        assert!(!err.is_fatal());
    }
}
