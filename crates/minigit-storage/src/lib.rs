//! Git object storage for Minigit.
//!
//! This crate provides the object model (blobs, trees, commits), the
//! content-addressed loose object store, file-backed references and
//! working tree snapshots.

mod commit;
pub mod compression;
mod error;
mod object;
mod refs;
mod store;
mod traits;
mod tree;
pub mod worktree;

pub use commit::{Commit, Signature};
pub use compression::CompressionLevel;
pub use error::StorageError;
pub use object::{header, Blob, Object, ObjectId, ObjectType};
pub use refs::{RefStore, Reference};
pub use store::{ObjectStore, Repository, GIT_DIR, MAIN_BRANCH};
pub use traits::ObjectSource;
pub use tree::{EntryMode, Tree, TreeEntry};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
