//! Snapshot log record types
//!
//! Every change to a durable store is one log record:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record including this field)
//! +------------------+
//! | Record Kind      | (u8)
//! +------------------+
//! | Body             | (JSON)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of all preceding bytes)
//! +------------------+
//! ```
//!
//! A `Commit` record carries both halves of a retire-then-append transition,
//! so a torn write can never leave an identifier with zero or two current
//! snapshots. A `Create` record likewise issues an identifier together with
//! its first snapshot.

use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};
use crate::model::{EntityId, Snapshot, VersionId};

/// Framing overhead: length + kind + checksum.
pub const RECORD_OVERHEAD: usize = 4 + 1 + 4;

/// On-disk record kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Allocate = 1,
    Append = 2,
    Retire = 3,
    Commit = 4,
    Create = 5,
}

impl RecordKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordKind::Allocate),
            2 => Some(RecordKind::Append),
            3 => Some(RecordKind::Retire),
            4 => Some(RecordKind::Commit),
            5 => Some(RecordKind::Create),
            _ => None,
        }
    }
}

/// One durable change to a snapshot store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LogRecord {
    /// A new identifier was issued.
    Allocate { entity_id: EntityId },
    /// A first snapshot was appended.
    Append { snapshot: Snapshot },
    /// A current snapshot was retired on its own.
    Retire {
        version_id: VersionId,
        at: DateTime<Utc>,
    },
    /// `retired` was superseded by `snapshot`, atomically.
    Commit {
        retired: VersionId,
        snapshot: Snapshot,
    },
    /// A new identifier was issued with `snapshot` as its first revision.
    Create { snapshot: Snapshot },
}

impl LogRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            LogRecord::Allocate { .. } => RecordKind::Allocate,
            LogRecord::Append { .. } => RecordKind::Append,
            LogRecord::Retire { .. } => RecordKind::Retire,
            LogRecord::Commit { .. } => RecordKind::Commit,
            LogRecord::Create { .. } => RecordKind::Create,
        }
    }

    /// Encode this record into its framed, checksummed form.
    pub fn serialize(&self) -> StoreResult<Vec<u8>> {
        let body = serde_json::to_vec(self).map_err(|e| {
            StoreError::unavailable(format!("Failed to encode log record: {}", e))
        })?;
        let total = RECORD_OVERHEAD + body.len();
        let length = u32::try_from(total).map_err(|_| {
            StoreError::unavailable(format!("Log record too large: {} bytes", total))
        })?;

        let mut buf = Vec::with_capacity(total);
        buf.extend_from_slice(&length.to_le_bytes());
        buf.push(self.kind() as u8);
        buf.extend_from_slice(&body);
        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Decode one complete framed record found at `offset`.
    pub fn deserialize(buf: &[u8], offset: u64) -> StoreResult<Self> {
        if buf.len() < RECORD_OVERHEAD {
            return Err(StoreError::corruption_at_offset(
                offset,
                format!("Record too short: {} bytes", buf.len()),
            ));
        }

        let (covered, trailer) = buf.split_at(buf.len() - 4);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if compute_checksum(covered) != stored {
            return Err(StoreError::corruption_at_offset(offset, "Checksum mismatch"));
        }

        let kind = RecordKind::from_u8(covered[4]).ok_or_else(|| {
            StoreError::corruption_at_offset(offset, format!("Unknown record kind {}", covered[4]))
        })?;

        let record: LogRecord = serde_json::from_slice(&covered[5..]).map_err(|e| {
            StoreError::corruption_at_offset(offset, format!("Undecodable record body: {}", e))
        })?;

        if record.kind() != kind {
            return Err(StoreError::corruption_at_offset(
                offset,
                "Record kind does not match record body",
            ));
        }
        Ok(record)
    }
}

/// CRC32 (IEEE) over the given bytes.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
