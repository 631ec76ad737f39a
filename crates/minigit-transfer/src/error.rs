//! Transfer error types.

use thiserror::Error;

/// Errors that can occur while fetching and decoding objects.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Invalid pack file format.
    #[error("invalid pack file: {0}")]
    InvalidPack(String),

    /// Invalid pkt-line format.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] minigit_storage::StorageError),

    /// The transport failed to deliver a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Returns true for malformed or unsupported wire data, as opposed to
    /// storage or transport failures.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::InvalidPack(_) | Self::InvalidPktLine(_) | Self::Protocol(_)
        )
    }
}
