//! CLI error type.

use thiserror::Error;

/// Errors surfaced to the user by the `minigit` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Object store or ref failure.
    #[error(transparent)]
    Storage(#[from] minigit_storage::StorageError),

    /// Diff failure.
    #[error(transparent)]
    Diff(#[from] minigit_diff::DiffError),

    /// Fetch or pack decoding failure.
    #[error(transparent)]
    Transfer(#[from] minigit_transfer::TransferError),

    /// Settings could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad arguments or an object that does not fit the command.
    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
