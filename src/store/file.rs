//! Durable snapshot store
//!
//! The same `SnapshotTable` as the memory store, fronted by an append-only
//! log. Writers of one store are serialized by the log writer's mutex: each
//! change is validated against the table, written and fsynced, and only then
//! applied to the table. Readers take the table lock alone and never wait on
//! the disk.
//!
//! One process owns a log at a time. `open` takes an exclusive advisory lock
//! on `<log>.lock`; a second opener gets `Unavailable` instead of a table
//! that would diverge from the file.
//!
//! On open the log is replayed in order. A record that does not apply
//! cleanly means the log was damaged or hand-edited; the store refuses to
//! open rather than serve a history it cannot vouch for.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use fs2::FileExt;

use super::errors::{StoreError, StoreErrorCode, StoreResult};
use super::log::{LogReader, LogWriter};
use super::record::LogRecord;
use super::table::SnapshotTable;
use super::{appended_version, created_snapshot, poisoned, SnapshotStore};
use crate::model::{EntityId, Snapshot, SnapshotDraft, VersionId};
use crate::observability::{log_event_with_fields, Event};

pub struct FileStore {
    path: PathBuf,
    table: RwLock<SnapshotTable>,
    writer: Mutex<LogWriter>,
    // released when the store is dropped
    _lock: File,
}

impl FileStore {
    /// Opens the log at `path`, replaying any existing records.
    ///
    /// Fails with `Unavailable` while another `FileStore` holds the log.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let lock = Self::lock(path)?;
        let table = if path.exists() {
            Self::replay(path)?
        } else {
            SnapshotTable::new()
        };
        let writer = LogWriter::open(path)?;

        let snapshots = table.len().to_string();
        let entities = table.entity_count().to_string();
        log_event_with_fields(
            Event::StoreOpened,
            &[
                ("entities", &entities),
                ("path", &path.display().to_string()),
                ("snapshots", &snapshots),
            ],
        );

        Ok(Self {
            path: path.to_path_buf(),
            table: RwLock::new(table),
            writer: Mutex::new(writer),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the lock file guarding the log at `path`.
    pub fn lock_path(path: &Path) -> PathBuf {
        path.with_extension("lock")
    }

    fn lock(path: &Path) -> StoreResult<File> {
        let lock_path = Self::lock_path(path);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::io_error(
                        format!("Failed to create data directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                StoreError::io_error(format!("Failed to open {}", lock_path.display()), e)
            })?;

        file.try_lock_exclusive().map_err(|e| {
            StoreError::unavailable(format!("Log {} is in use by another store", path.display()))
                .with_details(format!("{}: {}", lock_path.display(), e))
        })?;
        Ok(file)
    }

    fn replay(path: &Path) -> StoreResult<SnapshotTable> {
        let mut table = SnapshotTable::new();
        let mut reader = LogReader::open(path)?;
        let mut records = 0u64;

        loop {
            let offset = reader.current_offset();
            let Some(record) = reader.read_next()? else {
                break;
            };
            table.apply(&record).map_err(|e| match e.code() {
                StoreErrorCode::Corruption => e,
                _ => StoreError::corruption_at_offset(
                    offset,
                    format!("Log record does not apply: {}", e.message()),
                ),
            })?;
            records += 1;
        }

        log_event_with_fields(
            Event::StoreReplayComplete,
            &[
                ("path", &path.display().to_string()),
                ("records", &records.to_string()),
            ],
        );
        Ok(table)
    }

    /// Prepare, persist, apply.
    ///
    /// The table only changes under the writer mutex, so the state `prepare`
    /// saw is still the state `apply` runs against.
    fn write(&self, prepare: impl FnOnce(&SnapshotTable) -> StoreResult<LogRecord>) -> StoreResult<LogRecord> {
        let mut writer = self.writer.lock().map_err(|_| poisoned())?;
        let record = {
            let table = self.table.read().map_err(|_| poisoned())?;
            prepare(&table)?
        };
        writer.append(&record)?;

        let mut table = self.table.write().map_err(|_| poisoned())?;
        table.apply(&record)?;
        Ok(record)
    }

    fn read<T>(&self, f: impl FnOnce(&SnapshotTable) -> T) -> StoreResult<T> {
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(f(&table))
    }
}

impl SnapshotStore for FileStore {
    fn allocate(&self) -> StoreResult<EntityId> {
        match self.write(|t| t.prepare_allocate())? {
            LogRecord::Allocate { entity_id } => Ok(entity_id),
            other => Err(StoreError::invariant(format!(
                "Expected an allocate record, prepared {:?}",
                other.kind()
            ))),
        }
    }

    fn create(
        &self,
        content: String,
        created_at: DateTime<Utc>,
        created_by: String,
    ) -> StoreResult<Snapshot> {
        created_snapshot(self.write(|t| t.prepare_create(content, created_at, created_by))?)
    }

    fn append(&self, draft: SnapshotDraft) -> StoreResult<VersionId> {
        let record = self.write(|t| t.prepare_append(draft))?;
        appended_version(&record)
    }

    fn current(&self, entity_id: EntityId) -> StoreResult<Option<Snapshot>> {
        self.read(|t| t.current(entity_id).cloned())
    }

    fn by_version(&self, version_id: VersionId) -> StoreResult<Option<Snapshot>> {
        self.read(|t| t.get(version_id).cloned())
    }

    fn all_current(&self) -> StoreResult<Vec<Snapshot>> {
        self.read(|t| t.all_current())
    }

    fn history(&self, entity_id: EntityId) -> StoreResult<Vec<Snapshot>> {
        self.read(|t| t.history(entity_id))
    }

    fn retire(&self, version_id: VersionId, at: DateTime<Utc>) -> StoreResult<()> {
        self.write(|t| t.prepare_retire(version_id, at)).map(|_| ())
    }

    fn commit(&self, expected: VersionId, draft: SnapshotDraft) -> StoreResult<VersionId> {
        let record = self.write(|t| t.prepare_commit(expected, draft))?;
        appended_version(&record)
    }

    fn entity_ids(&self) -> StoreResult<Vec<EntityId>> {
        self.read(|t| t.entity_ids())
    }
}
