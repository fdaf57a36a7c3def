//! Configuration loading and management

mod io;
mod settings;

pub use settings::{DatabaseSettings, ProgressionSettings};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database location
    #[serde(default)]
    pub database: DatabaseSettings,

    /// Progression settings
    #[serde(default)]
    pub progression: ProgressionSettings,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .progression
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        Ok(config)
    }

    /// Config file inside `dir`, if any.
    /// Looks for: .progression/config.toml (preferred) or progression.toml
    pub fn local_config_path(dir: &Path) -> Option<PathBuf> {
        [dir.join(".progression/config.toml"), dir.join("progression.toml")]
            .into_iter()
            .find(|path| path.exists())
    }

    /// Load configuration from a directory, or defaults when it has none
    pub fn from_dir(dir: &Path) -> Result<Self> {
        match Self::local_config_path(dir) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::with_defaults()),
        }
    }

    /// Create a config with sensible defaults
    pub fn with_defaults() -> Self {
        Self {
            database: DatabaseSettings::default(),
            progression: ProgressionSettings::enabled(),
        }
    }

    /// Resolve the database path, falling back to ~/.progression/progression.db
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("progression.db"))
    }
}
