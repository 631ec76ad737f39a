//! User settings.
//!
//! Built-in defaults, overridden by `minigit.toml` in the user config
//! directory, overridden by `MINIGIT_*` environment variables.

use crate::error::Result;
use config::{Config, Environment, File};
use minigit_diff::DEFAULT_CONTEXT;
use minigit_storage::CompressionLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings file name inside the `minigit` config directory.
pub const CONFIG_FILE: &str = "minigit.toml";

/// Prefix of environment overrides, e.g. `MINIGIT_AUTHOR_NAME`.
pub const ENV_PREFIX: &str = "MINIGIT";

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Author and committer name for new commits.
    pub author_name: String,
    /// Author and committer email for new commits.
    pub author_email: String,
    /// Compression level for new loose objects.
    pub compression: CompressionLevel,
    /// `User-Agent` sent on HTTP requests.
    pub user_agent: String,
    /// Unchanged lines shown around each diff hunk.
    pub diff_context: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            author_name: "Minigit User".to_string(),
            author_email: "user@minigit.local".to_string(),
            compression: CompressionLevel::Default,
            user_agent: format!("minigit/{}", env!("CARGO_PKG_VERSION")),
            diff_context: DEFAULT_CONTEXT,
        }
    }
}

impl Settings {
    /// Returns the settings file path, if a config directory exists.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("minigit").join(CONFIG_FILE))
    }

    /// Loads settings from every layer.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::path(), Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(file: Option<PathBuf>, env: Environment) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("author_name", defaults.author_name)?
            .set_default("author_email", defaults.author_email)?
            .set_default("compression", "default")?
            .set_default("user_agent", defaults.user_agent)?
            .set_default("diff_context", defaults.diff_context as u64)?;

        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "reading settings file");
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Self = builder.add_source(env).build()?.try_deserialize()?;
        tracing::trace!(?settings, "loaded settings");
        Ok(settings)
    }
}
