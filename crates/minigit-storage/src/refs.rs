//! Git reference management.
//!
//! Refs are plain files under the `.git` directory: a direct ref holds
//! `<40 hex>\n`, a symbolic ref holds `ref: <target>\n`.

use crate::{ObjectId, Result, StorageError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A git reference (branch or symbolic ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl Reference {
    /// Returns the object ID if this is a direct reference.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    fn parse(name: &str, content: &str) -> Result<Self> {
        let content = content.trim_end();
        if let Some(target) = content.strip_prefix("ref: ") {
            return Ok(Self::Symbolic(target.to_string()));
        }
        ObjectId::from_hex(content)
            .map(Self::Direct)
            .map_err(|_| StorageError::InvalidRef(format!("{}: {:?}", name, content)))
    }
}

/// File-backed reference store.
#[derive(Debug, Clone)]
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Creates a reference store over a `.git` directory.
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('/')
            && !name.ends_with('/')
            && name.split('/').all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            return Err(StorageError::InvalidRef(name.to_string()));
        }
        Ok(self.git_dir.join(name))
    }

    /// Reads a reference, returning `None` if it does not exist.
    pub fn read(&self, name: &str) -> Result<Option<Reference>> {
        match fs::read_to_string(self.path(name)?) {
            Ok(content) => Reference::parse(name, &content).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Points a reference at an object.
    pub fn write_direct(&self, name: &str, id: &ObjectId) -> Result<()> {
        self.write_file(name, &format!("{}\n", id))?;
        tracing::debug!(name = %name, id = %id, "updated ref");
        Ok(())
    }

    /// Points a reference at another reference.
    pub fn write_symbolic(&self, name: &str, target: &str) -> Result<()> {
        self.path(target)?;
        self.write_file(name, &format!("ref: {}\n", target))
    }

    fn write_file(&self, name: &str, content: &str) -> Result<()> {
        let path = self.path(name)?;
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::InvalidRef(name.to_string()))?;
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(content.as_bytes())?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Resolves a reference to an object ID.
    ///
    /// Returns `None` for a missing ref or a symbolic ref to a branch that
    /// has no commits yet.
    pub fn resolve(&self, name: &str) -> Result<Option<ObjectId>> {
        match self.read(name)? {
            None => Ok(None),
            Some(Reference::Direct(id)) => Ok(Some(id)),
            Some(Reference::Symbolic(target)) => match self.read(&target)? {
                None => Ok(None),
                Some(Reference::Direct(id)) => Ok(Some(id)),
                Some(Reference::Symbolic(_)) => Err(StorageError::InvalidRef(
                    "deeply nested symbolic refs not supported".to_string(),
                )),
            },
        }
    }

    /// Resolves HEAD.
    pub fn head(&self) -> Result<Option<ObjectId>> {
        self.resolve("HEAD")
    }

    /// Gets the current branch name (if HEAD is symbolic).
    pub fn current_branch(&self) -> Result<Option<String>> {
        Ok(match self.read("HEAD")? {
            Some(Reference::Symbolic(target)) => target
                .strip_prefix("refs/heads/")
                .map(|s| s.to_string()),
            _ => None,
        })
    }
}
