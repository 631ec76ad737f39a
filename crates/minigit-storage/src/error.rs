//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed object header or payload.
    #[error("invalid object format: {0}")]
    Format(String),

    /// The requested object or ref was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored bytes do not match the digest they are filed under.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// A tree was built with two entries of the same name.
    #[error("duplicate tree entry: {0}")]
    DuplicateEntry(String),

    /// A ref file could not be interpreted.
    #[error("invalid ref: {0}")]
    InvalidRef(String),

    /// The directory does not contain a repository.
    #[error("not a repository: {0}")]
    NotARepository(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),
}

impl StorageError {
    /// Shorthand for a [`StorageError::Format`] error.
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Returns true if this error means the object or ref does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
