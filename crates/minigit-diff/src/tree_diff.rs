//! Recursive comparison of two trees.

use crate::{DiffError, Result};
use minigit_storage::{Blob, Object, ObjectId, ObjectSource, Tree, TreeEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a path differs between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Only in the new tree.
    Created,
    /// Only in the old tree.
    Deleted,
    /// In both trees with different content or kind.
    Changed,
}

/// A path that differs between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Slash-separated path relative to the compared trees.
    pub path: String,
    /// Kind of difference.
    pub kind: DiffKind,
    /// The entry in the old tree.
    pub old: Option<TreeEntry>,
    /// The entry in the new tree.
    pub new: Option<TreeEntry>,
}

/// Compares two trees, recursing into sub-directories present on both sides.
///
/// A name present on both sides with the same digest produces nothing, as
/// long as it is a directory on both sides or a file on both sides.
/// Executables and symlinks count as files. Directories only on one side are reported as a single entry.
/// Entries are ordered by path.
pub fn diff_trees(source: &impl ObjectSource, prev: &Tree, curr: &Tree) -> Result<Vec<DiffEntry>> {
    let mut out = Vec::new();
    diff_into(source, prev, curr, "", &mut out)?;
    Ok(out)
}

fn diff_into(
    source: &impl ObjectSource,
    prev: &Tree,
    curr: &Tree,
    prefix: &str,
    out: &mut Vec<DiffEntry>,
) -> Result<()> {
    if prev.id() == curr.id() {
        return Ok(());
    }

    let mut names: BTreeMap<&str, (Option<&TreeEntry>, Option<&TreeEntry>)> = BTreeMap::new();
    for entry in prev.entries() {
        names.entry(entry.name.as_str()).or_default().0 = Some(entry);
    }
    for entry in curr.entries() {
        names.entry(entry.name.as_str()).or_default().1 = Some(entry);
    }

    for (name, sides) in names {
        let path = join(prefix, name);
        match sides {
            (Some(old), Some(new)) => {
                if old.id == new.id && old.mode.is_dir() == new.mode.is_dir() {
                    continue;
                }
                if old.mode.is_dir() && new.mode.is_dir() {
                    tracing::trace!(path = %path, "descending into sub-tree");
                    let old_tree = load_tree(source, &old.id)?;
                    let new_tree = load_tree(source, &new.id)?;
                    diff_into(source, &old_tree, &new_tree, &path, out)?;
                } else {
                    out.push(DiffEntry {
                        path,
                        kind: DiffKind::Changed,
                        old: Some(old.clone()),
                        new: Some(new.clone()),
                    });
                }
            }
            (Some(old), None) => out.push(DiffEntry {
                path,
                kind: DiffKind::Deleted,
                old: Some(old.clone()),
                new: None,
            }),
            (None, Some(new)) => out.push(DiffEntry {
                path,
                kind: DiffKind::Created,
                old: None,
                new: Some(new.clone()),
            }),
            (None, None) => {}
        }
    }

    Ok(())
}

/// Joins a path prefix and a name with `/`.
pub(crate) fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Loads a tree, rejecting any other object type.
pub(crate) fn load_tree(source: &impl ObjectSource, id: &ObjectId) -> Result<Tree> {
    match source.get(id)? {
        Object::Tree(tree) => Ok(tree),
        _ => Err(DiffError::NotATree(*id)),
    }
}

/// Loads a blob, rejecting any other object type.
pub(crate) fn load_blob(source: &impl ObjectSource, id: &ObjectId) -> Result<Blob> {
    match source.get(id)? {
        Object::Blob(blob) => Ok(blob),
        _ => Err(DiffError::NotABlob(*id)),
    }
}
