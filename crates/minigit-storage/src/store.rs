//! Loose object store and repository management.

use crate::compression::{self, CompressionLevel};
use crate::traits::ObjectSource;
use crate::{worktree, Commit, Object, ObjectId, RefStore, Result, Signature, StorageError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of the repository metadata directory.
pub const GIT_DIR: &str = ".git";

/// The branch every repository commits to.
pub const MAIN_BRANCH: &str = "refs/heads/main";

/// Content-addressed loose object store.
///
/// Object `d` lives zlib-compressed at `objects/<d[0:2]>/<d[2:]>`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    level: CompressionLevel,
}

impl ObjectStore {
    /// Opens a store rooted at an `objects` directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            level: CompressionLevel::default(),
        }
    }

    /// Sets the compression level used for new objects.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// The `objects` directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding an object.
    pub fn path_for(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// Compresses and persists an object, returning its ID.
    ///
    /// Writing an object that is already stored is a no-op.
    pub fn write(&self, object: &Object) -> Result<ObjectId> {
        let id = *object.id();
        let path = self.path_for(&id);
        if path.exists() {
            tracing::trace!(id = %id, "object already stored");
            return Ok(id);
        }

        let bucket = self.root.join(&id.to_hex()[..2]);
        fs::create_dir_all(&bucket)?;

        let compressed = compression::compress(&object.encode(), self.level)?;
        let mut file = NamedTempFile::new_in(&bucket)?;
        file.write_all(&compressed)?;
        match file.persist_noclobber(&path) {
            Ok(_) => {}
            // another writer stored the same bytes first
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.error.into()),
        }

        tracing::debug!(
            id = %id,
            object_type = %object.object_type(),
            size = object.size(),
            compressed = compressed.len(),
            "wrote object"
        );
        Ok(id)
    }

    /// Reads an object, returning `None` if it is not stored.
    pub fn try_read(&self, id: &ObjectId) -> Result<Option<Object>> {
        let compressed = match fs::read(self.path_for(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let raw = compression::decompress(&compressed)?;
        let object = Object::decode(&raw)?;
        if object.id() != id {
            return Err(StorageError::Corruption(format!(
                "object filed under {} hashes to {}",
                id,
                object.id()
            )));
        }
        Ok(Some(object))
    }

    /// Reads an object; absence is a [`StorageError::NotFound`].
    pub fn read(&self, id: &ObjectId) -> Result<Object> {
        self.try_read(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_hex()))
    }

    /// Checks if an object is stored.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.path_for(id).is_file()
    }

    /// Lists the IDs of all stored objects, sorted.
    pub fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        let buckets = match fs::read_dir(&self.root) {
            Ok(buckets) => buckets,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        for bucket in buckets {
            let bucket = bucket?;
            let prefix = bucket.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !bucket.file_type()?.is_dir() {
                continue;
            }
            for file in fs::read_dir(bucket.path())? {
                let name = file?.file_name().to_string_lossy().into_owned();
                // temp files and anything else that is not a digest are skipped
                if let Ok(id) = ObjectId::from_hex(&format!("{}{}", prefix, name)) {
                    ids.push(id);
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

impl ObjectSource for ObjectStore {
    fn try_get(&self, id: &ObjectId) -> Result<Option<Object>> {
        self.try_read(id)
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(ObjectStore::contains(self, id))
    }
}

/// A working directory with its `.git` metadata.
#[derive(Debug)]
pub struct Repository {
    work_dir: PathBuf,
    git_dir: PathBuf,
    /// Object store.
    pub objects: ObjectStore,
    /// Reference store.
    pub refs: RefStore,
}

impl Repository {
    /// Creates the `.git` layout in `path` with `HEAD` pointing at `main`.
    ///
    /// Re-initialising an existing repository leaves its objects and refs alone.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let work_dir = path.as_ref().to_path_buf();
        let git_dir = work_dir.join(GIT_DIR);

        fs::create_dir_all(git_dir.join("objects"))?;
        fs::create_dir_all(git_dir.join("refs").join("heads"))?;

        let repo = Self::at(work_dir, git_dir);
        if repo.refs.read("HEAD")?.is_none() {
            repo.refs.write_symbolic("HEAD", MAIN_BRANCH)?;
        }

        tracing::info!(path = %repo.work_dir.display(), "initialized repository");
        Ok(repo)
    }

    /// Opens an existing repository rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let work_dir = path.as_ref().to_path_buf();
        let git_dir = work_dir.join(GIT_DIR);

        if !git_dir.join("objects").is_dir() || !git_dir.join("HEAD").is_file() {
            return Err(StorageError::NotARepository(
                work_dir.display().to_string(),
            ));
        }
        Ok(Self::at(work_dir, git_dir))
    }

    fn at(work_dir: PathBuf, git_dir: PathBuf) -> Self {
        Self {
            objects: ObjectStore::new(git_dir.join("objects")),
            refs: RefStore::new(&git_dir),
            work_dir,
            git_dir,
        }
    }

    /// Sets the compression level used for new objects.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.objects = self.objects.with_compression(level);
        self
    }

    /// The working directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The `.git` directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The commit HEAD resolves to, if any.
    pub fn head_commit(&self) -> Result<Option<Commit>> {
        match self.refs.head()? {
            Some(id) => Ok(Some(self.objects.read(&id)?.into_commit()?)),
            None => Ok(None),
        }
    }

    /// Commits the working tree to `main`.
    ///
    /// Returns `None` without writing a commit when the working tree matches
    /// the current HEAD commit.
    pub fn commit(&self, message: &str, signature: Signature) -> Result<Option<ObjectId>> {
        let tree = worktree::snapshot(&self.work_dir, Some(&self.objects))?;
        let parent = self.head_commit()?;

        if let Some(parent) = &parent {
            if parent.tree() == tree.id() {
                tracing::info!(tree = %tree.id(), "nothing to commit");
                return Ok(None);
            }
        }

        let commit = Commit::new(
            *tree.id(),
            parent.as_ref().map(|p| *p.id()),
            signature.clone(),
            signature,
            message,
        );
        let id = self.objects.write(&Object::from(commit))?;
        self.refs.write_direct(MAIN_BRANCH, &id)?;

        tracing::info!(commit = %id, tree = %tree.id(), "created commit");
        Ok(Some(id))
    }

    /// First-parent history starting at HEAD, newest first.
    pub fn log(&self) -> Result<Vec<Commit>> {
        let mut history = Vec::new();
        let mut next = self.refs.head()?;
        while let Some(id) = next {
            let commit = self.objects.read(&id)?.into_commit()?;
            next = commit.parent().copied();
            history.push(commit);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Blob, EntryMode, Tree, TreeEntry};
    use tempfile::TempDir;

    fn signature() -> Signature {
        Signature::new("Alice", "alice@example.com", 1_234_567_890, "+0000")
    }

    #[test]
    fn test_object_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path().join("objects"));
        let blob = Object::from(Blob::new(b"Hello, World!".to_vec()));

        let id = store.write(&blob).unwrap();
        assert_eq!(&id, blob.id());

        let hex = id.to_hex();
        let expected = dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        assert_eq!(store.path_for(&id), expected);
        assert!(expected.is_file());

        let read = store.read(&id).unwrap();
        assert_eq!(read, blob);
    }

    #[test]
    fn test_stored_bytes_are_zlib_of_encoding() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        let blob = Object::from(Blob::new(b"test".to_vec()));
        let id = store.write(&blob).unwrap();

        let on_disk = fs::read(store.path_for(&id)).unwrap();
        assert_eq!(compression::decompress(&on_disk).unwrap(), b"blob 4\0test");
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        let blob = Object::from(Blob::new(b"twice".to_vec()));

        let first = store.write(&blob).unwrap();
        let bytes = fs::read(store.path_for(&first)).unwrap();
        let second = store.write(&blob).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(store.path_for(&second)).unwrap(), bytes);
        assert_eq!(store.list().unwrap(), vec![first]);
    }

    #[test]
    fn test_read_missing() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        let id = ObjectId::from_bytes([3u8; 20]);

        assert!(store.try_read(&id).unwrap().is_none());
        assert!(store.read(&id).unwrap_err().is_not_found());
        assert!(!store.contains(&id));
    }

    #[test]
    fn test_read_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        let real = Object::from(Blob::new(b"real".to_vec()));
        let id = store.write(&real).unwrap();

        // file a different object under the same digest
        let other = compression::compress(b"blob 5\0other", CompressionLevel::Fast).unwrap();
        fs::remove_file(store.path_for(&id)).unwrap();
        fs::write(store.path_for(&id), other).unwrap();

        assert!(matches!(
            store.read(&id),
            Err(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn test_list_objects() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());

        let blob = Blob::new(b"a".to_vec());
        let tree = Tree::new(vec![TreeEntry::new(EntryMode::File, "a", *blob.id())]).unwrap();
        let mut expected = vec![
            store.write(&Object::from(blob)).unwrap(),
            store.write(&Object::from(tree)).unwrap(),
        ];
        expected.sort();

        assert_eq!(store.list().unwrap(), expected);
    }

    #[test]
    fn test_repository_init_and_open() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(StorageError::NotARepository(_))
        ));

        let repo = Repository::init(dir.path()).unwrap();
        assert!(repo.git_dir().join("objects").is_dir());
        assert_eq!(
            fs::read_to_string(repo.git_dir().join("HEAD")).unwrap(),
            "ref: refs/heads/main\n"
        );
        assert!(repo.head_commit().unwrap().is_none());

        let reopened = Repository::open(dir.path()).unwrap();
        assert_eq!(reopened.work_dir(), dir.path());
    }

    #[test]
    fn test_repository_commit_and_log() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        fs::write(dir.path().join("file.txt"), "one\n").unwrap();
        let first = repo.commit("first", signature()).unwrap().unwrap();

        assert_eq!(
            fs::read_to_string(repo.git_dir().join("refs/heads/main")).unwrap(),
            format!("{}\n", first)
        );

        // unchanged working tree
        assert!(repo.commit("again", signature()).unwrap().is_none());

        fs::write(dir.path().join("file.txt"), "two\n").unwrap();
        let second = repo.commit("second", signature()).unwrap().unwrap();

        let log = repo.log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id(), &second);
        assert_eq!(log[0].parent(), Some(&first));
        assert_eq!(log[1].id(), &first);
        assert!(log[1].parent().is_none());
        assert_eq!(log[1].summary(), "first");
    }
}
