//! Reference Pinning Tests
//!
//! A post stores comment version handles, never live comment identifiers.
//! Historical and current post views keep showing each comment exactly as
//! it was when attached.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use chronoset::protocol::{EngineContext, FixedActor, ManualClock, VersionError};
use chronoset::service::Services;

fn services() -> Services {
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_000, 0).unwrap()));
    Services::in_memory(EngineContext::new(clock, Arc::new(FixedActor::new("Billy"))))
}

// =============================================================================
// Frozen views
// =============================================================================

/// Editing a comment after attaching it does not change the post.
#[test]
fn test_child_edit_does_not_leak_into_parent() {
    let s = services();
    let p1 = s.posts.create("P1").unwrap();
    let c1 = s.comments.create("C1").unwrap();
    s.posts.attach_comment(p1.id, c1.id).unwrap();
    s.comments.edit(c1.id, "C1-edited").unwrap();

    let post = s.posts.find_one(p1.id).unwrap();
    assert_eq!(post.comments.len(), 1);
    assert_eq!(post.comments[0].content, "C1");
    assert_eq!(post.comments[0].version_id, c1.version_id);

    assert_eq!(s.comments.find_one(c1.id).unwrap().content, "C1-edited");
}

/// Deleting a comment leaves every post revision that pinned it intact.
#[test]
fn test_child_delete_does_not_leak_into_parent() {
    let s = services();
    let p1 = s.posts.create("P1").unwrap();
    let c1 = s.comments.create("C1").unwrap();
    s.posts.attach_comment(p1.id, c1.id).unwrap();
    s.comments.delete(c1.id).unwrap();

    let post = s.posts.find_one(p1.id).unwrap();
    assert_eq!(post.comments[0].content, "C1");
    assert!(!post.comments[0].deleted);
}

/// Older post revisions keep their own pins.
#[test]
fn test_historical_revisions_keep_their_pins() {
    let s = services();
    let post = s.posts.create("P1").unwrap();
    let c1 = s.comments.create("C1").unwrap();
    let with_c1 = s.posts.attach_comment(post.id, c1.id).unwrap();

    s.comments.edit(c1.id, "C1 v2").unwrap();
    s.posts.attach_comment(post.id, c1.id).unwrap();

    let old = s.posts.find_version(with_c1.version_id).unwrap();
    assert_eq!(old.entity.comments[0].content, "C1");
    assert!(!old.is_current());

    let current = s.posts.find_one(post.id).unwrap();
    assert_eq!(current.comments[0].content, "C1 v2");

    let history = s.posts.find_all_versions(post.id).unwrap();
    assert!(history[0].entity.comments.is_empty());
    assert_eq!(history[1].entity.comments[0].content, "C1");
    assert_eq!(history[2].entity.comments[0].content, "C1 v2");
}

// =============================================================================
// Pin set semantics
// =============================================================================

/// Comments keep attach order; re-attaching keeps position.
#[test]
fn test_pins_form_ordered_set() {
    let s = services();
    let post = s.posts.create("P").unwrap();
    let a = s.comments.create("A").unwrap();
    let b = s.comments.create("B").unwrap();
    s.posts.attach_comment(post.id, a.id).unwrap();
    s.posts.attach_comment(post.id, b.id).unwrap();

    s.comments.edit(a.id, "A2").unwrap();
    let post = s.posts.attach_comment(post.id, a.id).unwrap();

    let contents: Vec<&str> = post.comments.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["A2", "B"]);
}

/// Editing the post carries its pins forward unchanged.
#[test]
fn test_parent_edit_carries_pins() {
    let s = services();
    let post = s.posts.create("P").unwrap();
    let c = s.comments.create("C").unwrap();
    let attached = s.posts.attach_comment(post.id, c.id).unwrap();

    let edited = s.posts.edit(post.id, "P edited").unwrap();
    assert_eq!(edited.comments, attached.comments);
}

/// Tombstoned or unknown comments cannot be attached.
#[test]
fn test_attach_requires_live_comment() {
    let s = services();
    let post = s.posts.create("P").unwrap();
    let c = s.comments.create("C").unwrap();
    s.comments.delete(c.id).unwrap();

    assert!(matches!(
        s.posts.attach_comment(post.id, c.id),
        Err(VersionError::Deleted { .. })
    ));
    assert!(s
        .posts
        .attach_comment(post.id, chronoset::model::EntityId::new(77))
        .unwrap_err()
        .is_not_found());
    assert_eq!(s.posts.find_all_versions(post.id).unwrap().len(), 1);
}

/// The reference post/comment journey.
#[test]
fn test_post_comment_journey() {
    let s = services();
    let post = s.posts.create("My first post").unwrap();
    s.posts.edit(post.id, "My first post with an edit").unwrap();
    s.posts.edit(post.id, "My first post with a second edit").unwrap();
    let comment = s.comments.create("Your post stinks!").unwrap();
    s.posts.attach_comment(post.id, comment.id).unwrap();
    s.comments.edit(comment.id, "Woops, I meant your post rocks!").unwrap();

    assert_eq!(s.posts.find_all().unwrap().len(), 1);
    assert_eq!(s.posts.find_all_versions(post.id).unwrap().len(), 4);
    assert_eq!(s.comments.find_all().unwrap().len(), 1);
    assert_eq!(s.comments.find_all_versions(comment.id).unwrap().len(), 2);

    let current = s.posts.find_one(post.id).unwrap();
    assert_eq!(current.content, "My first post with a second edit");
    assert_eq!(current.comments[0].content, "Your post stinks!");
}
