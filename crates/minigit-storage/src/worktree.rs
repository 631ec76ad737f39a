//! Working tree snapshots and checkout.

use crate::store::GIT_DIR;
use crate::traits::ObjectSource;
use crate::{Blob, EntryMode, Object, ObjectStore, Result, StorageError, Tree, TreeEntry};
use std::fs;
use std::path::Path;

/// Hashes a single file as a blob.
pub fn hash_file(path: &Path) -> Result<Blob> {
    Ok(Blob::new(fs::read(path)?))
}

/// Builds a tree from a directory, recursively.
///
/// The `.git` directory is skipped, as are empty directories. When a store
/// is given, every blob and tree is written to it.
pub fn snapshot(dir: &Path, store: Option<&ObjectStore>) -> Result<Tree> {
    let mut entries = Vec::new();

    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let name = dirent.file_name().into_string().map_err(|name| {
            StorageError::format(format!("non UTF-8 file name: {:?}", name))
        })?;
        if name.eq_ignore_ascii_case(GIT_DIR) {
            continue;
        }

        let path = dirent.path();
        let file_type = dirent.file_type()?;

        let (mode, object) = if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            (EntryMode::Symlink, Object::from(Blob::new(link_bytes(&target))))
        } else if file_type.is_dir() {
            let subtree = snapshot(&path, store)?;
            if subtree.is_empty() {
                tracing::trace!(path = %path.display(), "skipping empty directory");
                continue;
            }
            (EntryMode::Directory, Object::from(subtree))
        } else {
            let mode = if is_executable(&dirent.metadata()?) {
                EntryMode::Executable
            } else {
                EntryMode::File
            };
            (mode, Object::from(hash_file(&path)?))
        };

        if let Some(store) = store {
            store.write(&object)?;
        }
        entries.push(TreeEntry::new(mode, name, *object.id()));
    }

    let tree = Tree::new(entries)?;
    if let Some(store) = store {
        store.write(&Object::from(tree.clone()))?;
    }
    tracing::debug!(path = %dir.display(), tree = %tree.id(), entries = tree.len(), "snapshot");
    Ok(tree)
}

/// Writes a tree's files into a directory, returning the number of files
/// written.
///
/// Symlinks and submodules are skipped.
pub fn checkout(source: &impl ObjectSource, tree: &Tree, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)?;
    let mut written = 0;

    for entry in tree.entries() {
        let path = dir.join(&entry.name);
        match entry.mode {
            EntryMode::Directory => {
                let subtree = source.get_tree(&entry.id)?;
                written += checkout(source, &subtree, &path)?;
            }
            EntryMode::File | EntryMode::Executable => {
                let blob = source.get_blob(&entry.id)?;
                fs::write(&path, blob.data())?;
                if entry.mode == EntryMode::Executable {
                    set_executable(&path)?;
                }
                written += 1;
            }
            EntryMode::Symlink | EntryMode::Gitlink => {
                tracing::warn!(path = %path.display(), mode = %entry.mode, "skipping unsupported entry");
            }
        }
    }

    Ok(written)
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn link_bytes(target: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    target.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn link_bytes(target: &Path) -> Vec<u8> {
    target.to_string_lossy().replace('\\', "/").into_bytes()
}
