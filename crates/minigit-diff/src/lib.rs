//! Tree and line differs for Minigit.
//!
//! [`diff_trees`] reports which paths differ between two trees,
//! [`shortest_edit`] computes a Myers edit script over any sequence, and
//! [`FileDiff`] turns two versions of a file into classified, numbered lines
//! grouped into hunks.

mod error;
pub mod line_diff;
pub mod myers;
pub mod snapshot;
pub mod tree_diff;

pub use error::{DiffError, Result};
pub use line_diff::{diff_lines, split_lines, FileDiff, Hunk, LineDiff, LineKind, DEFAULT_CONTEXT};
pub use myers::{shortest_edit, Edit, EditKind};
pub use snapshot::{diff_snapshots, FileChange};
pub use tree_diff::{diff_trees, DiffEntry, DiffKind};
