//! Diff error types.

use minigit_storage::{ObjectId, StorageError};
use thiserror::Error;

/// Errors that can occur while diffing.
#[derive(Debug, Error)]
pub enum DiffError {
    /// An object could not be loaded.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A directory entry does not point at a tree.
    #[error("{0} is not a tree")]
    NotATree(ObjectId),

    /// A file entry does not point at a blob.
    #[error("{0} is not a blob")]
    NotABlob(ObjectId),
}

/// Result type for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;
