//! File-level changes between two snapshots, with line diffs.

use crate::line_diff::FileDiff;
use crate::tree_diff::{self, diff_trees, load_blob, load_tree, DiffEntry, DiffKind};
use crate::Result;
use minigit_storage::{EntryMode, ObjectSource, Tree, TreeEntry};

/// A changed file and its line diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Slash-separated path.
    pub path: String,
    /// Kind of change.
    pub kind: DiffKind,
    /// Line diff; `None` when either side is not a regular file or symlink.
    pub diff: Option<FileDiff>,
}

impl FileChange {
    /// Counts `(insertions, deletions)`, zero when there is no line diff.
    pub fn summary(&self) -> (usize, usize) {
        self.diff.as_ref().map(FileDiff::summary).unwrap_or((0, 0))
    }
}

/// Diffs two trees down to individual files.
///
/// Directories created or deleted wholesale are expanded into one change
/// per file. A path whose kind changed (file to directory or back) is
/// reported once, without a line diff.
pub fn diff_snapshots(
    source: &impl ObjectSource,
    prev: &Tree,
    curr: &Tree,
) -> Result<Vec<FileChange>> {
    let mut changes = Vec::new();
    for entry in diff_trees(source, prev, curr)? {
        expand(source, entry, &mut changes)?;
    }
    tracing::debug!(files = changes.len(), "diffed snapshots");
    Ok(changes)
}

fn expand(source: &impl ObjectSource, entry: DiffEntry, out: &mut Vec<FileChange>) -> Result<()> {
    match (entry.kind, &entry.old, &entry.new) {
        (DiffKind::Created, _, Some(new)) => one_sided(source, &entry.path, new, DiffKind::Created, out),
        (DiffKind::Deleted, Some(old), _) => one_sided(source, &entry.path, old, DiffKind::Deleted, out),
        (DiffKind::Changed, Some(old), Some(new)) => {
            let diff = if has_text(old.mode) && has_text(new.mode) {
                let old_blob = load_blob(source, &old.id)?;
                let new_blob = load_blob(source, &new.id)?;
                Some(FileDiff::between(&old_blob.text(), &new_blob.text()))
            } else {
                None
            };
            out.push(FileChange {
                path: entry.path,
                kind: DiffKind::Changed,
                diff,
            });
            Ok(())
        }
        _ => Ok(()),
    }
}

fn one_sided(
    source: &impl ObjectSource,
    path: &str,
    entry: &TreeEntry,
    kind: DiffKind,
    out: &mut Vec<FileChange>,
) -> Result<()> {
    if entry.mode.is_dir() {
        let tree = load_tree(source, &entry.id)?;
        for child in tree.entries() {
            one_sided(source, &tree_diff::join(path, &child.name), child, kind, out)?;
        }
        return Ok(());
    }

    let diff = if has_text(entry.mode) {
        let text = load_blob(source, &entry.id)?.text().into_owned();
        Some(match kind {
            DiffKind::Deleted => FileDiff::deleted(&text),
            _ => FileDiff::created(&text),
        })
    } else {
        None
    };

    out.push(FileChange {
        path: path.to_string(),
        kind,
        diff,
    });
    Ok(())
}

fn has_text(mode: EntryMode) -> bool {
    matches!(mode, EntryMode::File | EntryMode::Executable | EntryMode::Symlink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_diff::tests::Objects;
    use crate::DiffError;
    use minigit_storage::ObjectId;

    #[test]
    fn test_changed_file_has_line_diff() {
        let mut objects = Objects::default();
        let old = objects.file("notes.txt", "a\nb\nc\n");
        let new = objects.file("notes.txt", "a\nx\nc\nd\n");
        let prev = objects.tree(vec![old]);
        let curr = objects.tree(vec![new]);

        let changes = diff_snapshots(&objects, &prev, &curr).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "notes.txt");
        assert_eq!(changes[0].kind, DiffKind::Changed);
        assert_eq!(changes[0].summary(), (2, 1));
    }

    #[test]
    fn test_created_directory_expands() {
        let mut objects = Objects::default();
        let one = objects.file("one.txt", "1\n");
        let two = objects.file("two.txt", "2\n2\n");
        let deep = objects.dir("deep", vec![two]);
        let pkg = objects.dir("pkg", vec![one, deep]);
        let prev = objects.tree(Vec::new());
        let curr = objects.tree(vec![pkg]);

        let changes = diff_snapshots(&objects, &prev, &curr).unwrap();
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["pkg/deep/two.txt", "pkg/one.txt"]);
        assert!(changes.iter().all(|c| c.kind == DiffKind::Created));
        assert_eq!(changes[0].summary(), (2, 0));

        let reverse = diff_snapshots(&objects, &curr, &prev).unwrap();
        assert!(reverse.iter().all(|c| c.kind == DiffKind::Deleted));
        assert_eq!(reverse[1].summary(), (0, 1));
    }

    #[test]
    fn test_kind_change_has_no_line_diff() {
        let mut objects = Objects::default();
        let as_file = objects.file("x", "file\n");
        let inner = objects.file("y", "z\n");
        let as_dir = objects.dir("x", vec![inner]);
        let prev = objects.tree(vec![as_file]);
        let curr = objects.tree(vec![as_dir]);

        let changes = diff_snapshots(&objects, &prev, &curr).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].diff.is_none());
        assert_eq!(changes[0].summary(), (0, 0));
    }

    #[test]
    fn test_file_pointing_at_tree() {
        let mut objects = Objects::default();
        let tree_id = *objects.tree(Vec::new()).id();
        let prev = objects.tree(Vec::new());
        let curr = objects.tree(vec![TreeEntry::new(EntryMode::File, "f", tree_id)]);

        let err = diff_snapshots(&objects, &prev, &curr).unwrap_err();
        assert!(matches!(err, DiffError::NotABlob(id) if id == tree_id));
    }

    #[test]
    fn test_missing_blob() {
        let mut objects = Objects::default();
        let missing = ObjectId::from_bytes([1u8; 20]);
        let prev = objects.tree(Vec::new());
        let curr = objects.tree(vec![TreeEntry::new(EntryMode::File, "f", missing)]);

        assert!(matches!(
            diff_snapshots(&objects, &prev, &curr),
            Err(DiffError::Storage(_))
        ));
    }
}
