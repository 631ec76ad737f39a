//! End-to-end diff test over an on-disk repository.
//!
//! Two commits are made in a temporary working tree and the differ is run
//! against the stored trees, the same way `minigit diff` does.

use minigit_diff::{diff_snapshots, diff_trees, DiffKind, LineKind, DEFAULT_CONTEXT};
use minigit_storage::{ObjectSource, Repository, Signature};
use std::fs;
use tempfile::TempDir;

fn signature() -> Signature {
    Signature::new("Carol", "carol@example.com", 1_700_000_000, "+0000")
}

#[test]
fn test_diff_between_commits() {
    let work = TempDir::new().unwrap();
    let repo = Repository::init(work.path()).unwrap();

    fs::create_dir_all(work.path().join("dir1/dir2")).unwrap();
    fs::write(work.path().join("dir1/dir2/file.txt"), "alpha\nbeta\ngamma\n").unwrap();
    fs::write(work.path().join("stale.txt"), "old\n").unwrap();
    let first = repo.commit("first", signature()).unwrap().unwrap();

    fs::write(work.path().join("dir1/dir2/file.txt"), "alpha\nBETA\ngamma\n").unwrap();
    fs::remove_file(work.path().join("stale.txt")).unwrap();
    fs::write(work.path().join("fresh.txt"), "new\nlines\n").unwrap();
    let second = repo.commit("second", signature()).unwrap().unwrap();

    let old = repo.objects.get_commit(&first).unwrap();
    let new = repo.objects.get_commit(&second).unwrap();
    let old_tree = repo.objects.get_tree(old.tree()).unwrap();
    let new_tree = repo.objects.get_tree(new.tree()).unwrap();

    let entries = diff_trees(&repo.objects, &old_tree, &new_tree).unwrap();
    let summary: Vec<_> = entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
    assert_eq!(
        summary,
        vec![
            ("dir1/dir2/file.txt", DiffKind::Changed),
            ("fresh.txt", DiffKind::Created),
            ("stale.txt", DiffKind::Deleted),
        ]
    );

    let changes = diff_snapshots(&repo.objects, &old_tree, &new_tree).unwrap();
    let file = &changes[0];
    assert_eq!(file.summary(), (1, 1));

    let diff = file.diff.as_ref().unwrap();
    let hunks = diff.hunks(DEFAULT_CONTEXT);
    assert_eq!(hunks.len(), 1);
    assert_eq!(hunks[0].header(), "@@ -1,3 +1,3 @@");
    let deleted: Vec<_> = diff
        .lines()
        .iter()
        .filter(|l| l.kind == LineKind::Deleted)
        .map(|l| l.text())
        .collect();
    assert_eq!(deleted, vec!["beta"]);

    assert_eq!(changes[1].summary(), (2, 0));
    assert_eq!(changes[2].summary(), (0, 1));
}
