//! The request/response seam between the fetch pipeline and HTTP.

use crate::Result;

/// Blocking access to a remote repository.
///
/// Paths are relative to the repository URL. Implementations return the
/// whole response body and map non-success replies to
/// [`TransferError::Transport`](crate::TransferError::Transport).
pub trait Transport {
    /// Issues a GET request.
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Issues a POST request with the given body and content type.
    fn post(&self, path: &str, body: &[u8], content_type: &str) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, path: &str) -> Result<Vec<u8>> {
        (**self).get(path)
    }

    fn post(&self, path: &str, body: &[u8], content_type: &str) -> Result<Vec<u8>> {
        (**self).post(path, body, content_type)
    }
}
