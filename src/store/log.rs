//! Append-only snapshot log
//!
//! - Every record is written in one `write_all` and fsynced before the
//!   caller may apply it
//! - A failed write is truncated away before the error is returned
//! - A failed fsync poisons the writer: the tail is in an unknown state
//! - Reads validate the checksum of every record
//! - Any framing or checksum failure is corruption; there is no
//!   "skip the torn tail" mode

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use super::errors::{StoreError, StoreResult};
use super::record::{LogRecord, RECORD_OVERHEAD};

/// Writer for one store's log file.
pub struct LogWriter {
    path: PathBuf,
    file: File,
    current_offset: u64,
    poisoned: bool,
}

impl LogWriter {
    /// Opens or creates the log at `path`, creating parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::write_failed(
                        format!("Failed to create data directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                StoreError::write_failed(format!("Failed to open log: {}", path.display()), e)
            })?;

        let current_offset = file
            .metadata()
            .map_err(|e| StoreError::io_error("Failed to read log metadata", e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            current_offset,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Writes one record and fsyncs it. Returns the record's offset.
    ///
    /// - write failure: the partial record is truncated away, `WriteFailed`
    /// - fsync or truncate failure: `SyncFailed` (FATAL), writer poisoned
    /// - log longer than this writer left it: `Corruption` (FATAL)
    pub fn append(&mut self, record: &LogRecord) -> StoreResult<u64> {
        if self.poisoned {
            return Err(StoreError::corruption(format!(
                "Log {} is in an unknown state after an earlier failure",
                self.path.display()
            )));
        }

        let bytes = record.serialize()?;
        let offset = self.current_offset;
        self.check_tail()?;

        if let Err(e) = self.file.write_all(&bytes) {
            self.truncate_to(offset)?;
            return Err(StoreError::write_failed(
                format!("Failed to write {:?} record", record.kind()),
                e,
            ));
        }

        // fsync - the record does not exist until it is durable
        if let Err(e) = self.file.sync_all() {
            self.poisoned = true;
            return Err(StoreError::sync_failed(
                format!("fsync failed after {:?} record", record.kind()),
                e,
            ));
        }

        self.current_offset += bytes.len() as u64;
        Ok(offset)
    }

    fn check_tail(&mut self) -> StoreResult<()> {
        let len = self
            .file
            .metadata()
            .map_err(|e| StoreError::io_error("Failed to read log metadata", e))?
            .len();
        if len != self.current_offset {
            self.poisoned = true;
            return Err(StoreError::corruption_at_offset(
                self.current_offset,
                format!("Log is {} bytes, writer expected {}", len, self.current_offset),
            ));
        }
        Ok(())
    }

    /// Cut the file back to `offset` after a failed write.
    fn truncate_to(&mut self, offset: u64) -> StoreResult<()> {
        let result = self.file.set_len(offset).and_then(|_| self.file.sync_all());
        result.map_err(|e| {
            self.poisoned = true;
            StoreError::sync_failed(
                format!("Failed to roll back partial record at offset {}", offset),
                e,
            )
        })
    }
}

/// Sequential reader used for replay.
pub struct LogReader {
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl LogReader {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| {
            StoreError::read_failed(format!("Failed to open log: {}", path.display()), e)
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| StoreError::read_failed("Failed to read log metadata", e))?
            .len();

        Ok(Self {
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next record.
    ///
    /// - `Ok(Some(record))` if a record was read
    /// - `Ok(None)` at end of log
    /// - `Err(CHRONO_STORE_CORRUPTION)` on any damage (FATAL)
    pub fn read_next(&mut self) -> StoreResult<Option<LogRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let offset = self.current_offset;
        let remaining = self.file_size - offset;
        if remaining < RECORD_OVERHEAD as u64 {
            return Err(StoreError::corruption_at_offset(
                offset,
                format!("Truncated log: {} trailing bytes", remaining),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StoreError::corruption_at_offset(offset, format!("Failed to read record length: {}", e))
        })?;
        let length = u32::from_le_bytes(len_buf) as u64;

        if length < RECORD_OVERHEAD as u64 || length > remaining {
            return Err(StoreError::corruption_at_offset(
                offset,
                format!("Invalid record length {} with {} bytes remaining", length, remaining),
            ));
        }

        let mut buf = vec![0u8; length as usize];
        buf[..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut buf[4..]).map_err(|e| {
            StoreError::corruption_at_offset(offset, format!("Failed to read record: {}", e))
        })?;

        let record = LogRecord::deserialize(&buf, offset)?;
        self.current_offset += length;
        Ok(Some(record))
    }
}
