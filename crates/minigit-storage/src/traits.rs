//! Object lookup traits.
//!
//! Lets the differs and checkout read objects from the on-disk store or from
//! an in-memory index (such as a freshly decoded pack) interchangeably.

use crate::{Blob, Commit, Object, ObjectId, Result, StorageError, Tree};
use std::collections::HashMap;

/// Read access to objects by digest.
pub trait ObjectSource {
    /// Retrieves an object by ID, returning `None` when it is absent.
    fn try_get(&self, id: &ObjectId) -> Result<Option<Object>>;

    /// Retrieves an object by ID; absence is a [`StorageError::NotFound`].
    fn get(&self, id: &ObjectId) -> Result<Object> {
        self.try_get(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_hex()))
    }

    /// Checks if an object exists.
    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.try_get(id)?.is_some())
    }

    /// Retrieves a blob.
    fn get_blob(&self, id: &ObjectId) -> Result<Blob> {
        self.get(id)?.into_blob()
    }

    /// Retrieves a tree.
    fn get_tree(&self, id: &ObjectId) -> Result<Tree> {
        self.get(id)?.into_tree()
    }

    /// Retrieves a commit.
    fn get_commit(&self, id: &ObjectId) -> Result<Commit> {
        self.get(id)?.into_commit()
    }
}

impl ObjectSource for HashMap<ObjectId, Object> {
    fn try_get(&self, id: &ObjectId) -> Result<Option<Object>> {
        Ok(HashMap::get(self, id).cloned())
    }
}

impl<T: ObjectSource + ?Sized> ObjectSource for &T {
    fn try_get(&self, id: &ObjectId) -> Result<Option<Object>> {
        (**self).try_get(id)
    }
}
