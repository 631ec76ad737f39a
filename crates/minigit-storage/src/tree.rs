//! Tree objects: directory snapshots.
//!
//! Tree payload format: a sequence of `<mode> <name>\0<20-byte digest>` records,
//! sorted by name.

use crate::store::GIT_DIR;
use crate::{ObjectId, ObjectType, Result, StorageError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Regular file.
    File,
    /// Executable file.
    Executable,
    /// Symbolic link; the blob holds the link target.
    Symlink,
    /// Sub-directory.
    Directory,
    /// Submodule commit.
    Gitlink,
}

impl EntryMode {
    /// Returns the octal mode string written into tree payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "100644",
            Self::Executable => "100755",
            Self::Symlink => "120000",
            Self::Directory => "40000",
            Self::Gitlink => "160000",
        }
    }

    /// Parses a mode string from a tree payload.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "100644" => Ok(Self::File),
            "100755" => Ok(Self::Executable),
            "120000" => Ok(Self::Symlink),
            "40000" | "040000" => Ok(Self::Directory),
            "160000" => Ok(Self::Gitlink),
            _ => Err(StorageError::format(format!("unknown entry mode: {}", s))),
        }
    }

    /// Returns true for sub-directories.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// The type of object the entry points at.
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Directory => ObjectType::Tree,
            Self::Gitlink => ObjectType::Commit,
            Self::File | Self::Executable | Self::Symlink => ObjectType::Blob,
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry mode.
    pub mode: EntryMode,
    /// File or directory name (a single path component).
    pub name: String,
    /// Digest of the referenced blob or tree.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Creates a new tree entry.
    pub fn new(mode: EntryMode, name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    /// Orders entries the way git does: byte-wise by name, with directory
    /// names compared as if they ended in `/`.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        let a = self
            .name
            .as_bytes()
            .iter()
            .chain(self.mode.is_dir().then_some(&b'/'));
        let b = other
            .name
            .as_bytes()
            .iter()
            .chain(other.mode.is_dir().then_some(&b'/'));
        a.cmp(b)
    }
}

/// A directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    id: ObjectId,
    entries: Vec<TreeEntry>,
    data: Bytes,
}

impl Tree {
    /// Builds a tree from entries in any order.
    ///
    /// Entries are sorted canonically before the payload is rendered, so the
    /// digest does not depend on directory listing order.
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            validate_name(&entry.name)?;
            if !seen.insert(entry.name.as_str()) {
                return Err(StorageError::DuplicateEntry(entry.name.clone()));
            }
        }
        entries.sort_by(TreeEntry::canonical_cmp);

        let mut data = Vec::new();
        for entry in &entries {
            data.extend_from_slice(entry.mode.as_str().as_bytes());
            data.push(b' ');
            data.extend_from_slice(entry.name.as_bytes());
            data.push(0);
            data.extend_from_slice(entry.id.as_bytes());
        }

        let data = Bytes::from(data);
        let id = ObjectId::hash_object(ObjectType::Tree, &data);
        Ok(Self { id, entries, data })
    }

    /// Creates the empty tree.
    pub fn empty() -> Self {
        let data = Bytes::new();
        Self {
            id: ObjectId::hash_object(ObjectType::Tree, &data),
            entries: Vec::new(),
            data,
        }
    }

    /// Parses a tree payload.
    ///
    /// The payload must be consumed exactly by whole records, and the records
    /// must be uniquely named and in canonical order.
    pub fn decode(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut seen = HashSet::new();
        let mut rest = &data[..];

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| StorageError::format("truncated tree entry: missing mode"))?;
            let mode = std::str::from_utf8(&rest[..space])
                .map_err(|_| StorageError::format("tree entry mode is not ASCII"))?;
            let mode = EntryMode::parse(mode)?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| StorageError::format("truncated tree entry: missing name"))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| StorageError::format("tree entry name is not UTF-8"))?
                .to_string();
            validate_name(&name)?;
            rest = &rest[nul + 1..];

            if rest.len() < ObjectId::LEN {
                return Err(StorageError::format(format!(
                    "truncated tree entry: {} has a partial digest",
                    name
                )));
            }
            let id = ObjectId::from_slice(&rest[..ObjectId::LEN])?;
            rest = &rest[ObjectId::LEN..];

            let entry = TreeEntry { mode, name, id };
            if !seen.insert(entry.name.clone()) {
                return Err(StorageError::format(format!(
                    "duplicate tree entry: {}",
                    entry.name
                )));
            }
            if let Some(prev) = entries.last() {
                if prev.canonical_cmp(&entry) != Ordering::Less {
                    return Err(StorageError::format(format!(
                        "tree entries out of order: {} before {}",
                        prev.name, entry.name
                    )));
                }
            }
            entries.push(entry);
        }

        let id = ObjectId::hash_object(ObjectType::Tree, &data);
        Ok(Self { id, entries, data })
    }

    /// The tree's digest.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// The entries, in canonical order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// The encoded payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Looks up an entry by name.
    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rejects names that could escape the directory being written or land in
/// repository metadata. `.git` is matched case-insensitively.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.eq_ignore_ascii_case(GIT_DIR)
        || name.contains(['/', '\0'])
    {
        return Err(StorageError::format(format!(
            "invalid tree entry name: {:?}",
            name
        )));
    }
    Ok(())
}
