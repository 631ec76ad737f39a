//! End-to-end repository test.
//!
//! This test verifies the on-disk round trip:
//! 1. A repository is initialised and two commits are made
//! 2. The objects are read back from a freshly opened handle
//! 3. The latest tree is checked out into an empty directory

use minigit_storage::{
    worktree, EntryMode, ObjectSource, ObjectStore, Repository, Signature, GIT_DIR,
};
use std::fs;
use tempfile::TempDir;

fn signature(timestamp: i64) -> Signature {
    Signature::new("Bob", "bob@example.com", timestamp, "+0100")
}

#[test]
fn test_commit_reopen_checkout() {
    let work = TempDir::new().unwrap();
    let repo = Repository::init(work.path()).unwrap();

    fs::write(work.path().join("README.md"), "# Project\n").unwrap();
    fs::create_dir_all(work.path().join("src")).unwrap();
    fs::write(work.path().join("src/lib.rs"), "pub fn one() {}\n").unwrap();
    let first = repo.commit("Initial commit", signature(1_700_000_000)).unwrap().unwrap();

    fs::write(work.path().join("src/lib.rs"), "pub fn two() {}\n").unwrap();
    let second = repo.commit("Rename function", signature(1_700_000_100)).unwrap().unwrap();

    let reopened = Repository::open(work.path()).unwrap();
    assert_eq!(reopened.refs.head().unwrap(), Some(second));
    assert_eq!(reopened.refs.current_branch().unwrap().as_deref(), Some("main"));

    let head = reopened.head_commit().unwrap().unwrap();
    assert_eq!(head.parent(), Some(&first));
    assert_eq!(head.author().utc_offset, "+0100");
    assert_eq!(head.message(), "Rename function\n");

    let tree = reopened.objects.get_tree(head.tree()).unwrap();
    assert_eq!(tree.entry("src").unwrap().mode, EntryMode::Directory);

    let out = TempDir::new().unwrap();
    let written = worktree::checkout(&reopened.objects, &tree, out.path()).unwrap();
    assert_eq!(written, 2);
    assert_eq!(
        fs::read_to_string(out.path().join("src/lib.rs")).unwrap(),
        "pub fn two() {}\n"
    );
    assert!(!out.path().join(GIT_DIR).exists());
}

#[test]
fn test_store_shared_between_handles() {
    let work = TempDir::new().unwrap();
    let repo = Repository::init(work.path()).unwrap();
    fs::write(work.path().join("a.txt"), "shared\n").unwrap();
    repo.commit("add a", signature(1)).unwrap();

    let store = ObjectStore::new(work.path().join(GIT_DIR).join("objects"));
    let ids = store.list().unwrap();
    // blob, tree, commit
    assert_eq!(ids.len(), 3);
    for id in &ids {
        assert_eq!(store.read(id).unwrap().id(), id);
    }
}
