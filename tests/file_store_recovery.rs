//! File Store Recovery Tests
//!
//! The durable store rebuilds its table by replaying the log on open.
//! - Complete history survives a restart
//! - Identifiers and version handles keep increasing
//! - Any damage (torn tail, flipped byte, impossible record) refuses to open

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use chronoset::model::{EntityId, Snapshot, SnapshotDraft, VersionId};
use chronoset::protocol::{EngineContext, FixedActor, ManualClock};
use chronoset::service::{FileStores, Services};
use chronoset::store::{FileStore, LogRecord, LogWriter, SnapshotStore, StoreErrorCode};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn ctx(start: DateTime<Utc>) -> EngineContext {
    EngineContext::new(
        Arc::new(ManualClock::new(start)),
        Arc::new(FixedActor::new("Billy")),
    )
}

fn write_history(path: &Path) -> (EntityId, VersionId) {
    let store = FileStore::open(path).unwrap();
    let id = store.allocate().unwrap();
    let v1 = store.append(SnapshotDraft::initial(id, "one", t(1), "Billy")).unwrap();
    let v2 = store.commit(v1, SnapshotDraft::initial(id, "two", t(2), "Billy")).unwrap();
    (id, v2)
}

// =============================================================================
// Replay
// =============================================================================

/// Services see the same posts, comments and pins after a restart.
#[test]
fn test_services_survive_restart() {
    let dir = TempDir::new().unwrap();

    let (post_id, comment_id) = {
        let services = Services::durable(FileStores::open(dir.path()).unwrap(), ctx(t(100)));
        let post = services.posts.create("P1").unwrap();
        let comment = services.comments.create("C1").unwrap();
        services.posts.attach_comment(post.id, comment.id).unwrap();
        services.posts.edit(post.id, "P1 edited").unwrap();
        (post.id, comment.id)
    };

    let stores = FileStores::open(dir.path()).unwrap();
    let floor = stores.newest_timestamp().unwrap().unwrap();
    let services = Services::durable(stores, ctx(floor + chrono::Duration::seconds(1)));

    services.comments.edit(comment_id, "C1 edited").unwrap();

    let post = services.posts.find_one(post_id).unwrap();
    assert_eq!(post.content, "P1 edited");
    assert_eq!(post.comments[0].content, "C1");
    assert_eq!(services.posts.find_all_versions(post_id).unwrap().len(), 3);
    assert_eq!(services.comments.find_all_versions(comment_id).unwrap().len(), 2);
    assert!(services.verify().unwrap().iter().all(|r| r.is_ok()));
}

/// Handles keep increasing across restarts.
#[test]
fn test_handles_continue_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("posts.log");
    let (id, v2) = write_history(&path);

    let store = FileStore::open(&path).unwrap();
    let next = store.allocate().unwrap();
    assert_eq!(next, EntityId::new(id.value() + 1));

    let v3 = store.append(SnapshotDraft::initial(next, "fresh", t(3), "Sally")).unwrap();
    assert_eq!(v3, VersionId::new(v2.value() + 1));
}

/// An empty data directory opens as an empty store.
#[test]
fn test_fresh_directory_opens_empty() {
    let dir = TempDir::new().unwrap();
    let stores = FileStores::open(&dir.path().join("new")).unwrap();
    assert!(stores.posts.entity_ids().unwrap().is_empty());
    assert_eq!(stores.newest_timestamp().unwrap(), None);
}

// =============================================================================
// Damage
// =============================================================================

/// A torn final record refuses to open.
#[test]
fn test_torn_tail_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("posts.log");
    write_history(&path);

    let len = std::fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 3).unwrap();
    drop(file);

    let err = FileStore::open(&path).err().unwrap();
    assert_eq!(err.code(), StoreErrorCode::Corruption);
    assert!(err.is_fatal());
}

/// A flipped byte in the middle of the log is caught by the checksum.
#[test]
fn test_flipped_byte_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("posts.log");
    write_history(&path);

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(20)).unwrap();
    file.write_all(b"#").unwrap();
    drop(file);

    let err = FileStore::open(&path).err().unwrap();
    assert_eq!(err.code(), StoreErrorCode::Corruption);
}

/// A well-formed record that would break the timeline refuses to open.
#[test]
fn test_impossible_record_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("posts.log");
    let (id, _) = write_history(&path);

    // a second first-snapshot for an identifier that already has one
    let mut writer = LogWriter::open(&path).unwrap();
    let forged = Snapshot::from_draft(
        VersionId::new(3),
        SnapshotDraft::initial(id, "forged", t(9), "Mallory"),
    );
    writer.append(&LogRecord::Append { snapshot: forged }).unwrap();
    drop(writer);

    let err = FileStore::open(&path).err().unwrap();
    assert_eq!(err.code(), StoreErrorCode::Corruption);
    assert!(err.details().is_some());
}
