//! Configuration file I/O operations

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

use super::Config;

impl Config {
    /// Get the global config directory path (~/.progression/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".progression")
    }

    /// Get the global config file path (~/.progression/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Load the global config, or defaults when none has been written yet
    pub fn load_global() -> Result<Self> {
        let path = Self::global_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::with_defaults())
        }
    }

    /// Write the config as TOML, preceded by a short header.
    ///
    /// Writers serialize on `<file>.lock` and the target is replaced by a single rename.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(self).context("Config is not representable as TOML")?;
        let content = format!("{}{}", SAVED_HEADER, body);

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;

        let lock = lock_sibling(path)?;
        replace_file(path, content.as_bytes())?;
        drop(lock);

        debug!(path = %path.display(), "Saved progression config");
        Ok(())
    }
}

const SAVED_HEADER: &str =
    "# Written by `progression init --global`. Host system_settings rows override these keys.\n\n";

/// Hold an exclusive advisory lock on `<path>.lock` until the returned file is dropped
fn lock_sibling(path: &Path) -> Result<File> {
    let lock_path = path.with_extension("toml.lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("Cannot open {}", lock_path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("Cannot lock {}", lock_path.display()))?;
    Ok(file)
}

/// Write `bytes` next to `path`, fsync, then rename over `path`
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let staging = path.with_extension("toml.tmp");
    {
        let mut file = File::create(&staging)
            .with_context(|| format!("Cannot create {}", staging.display()))?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(e).with_context(|| format!("Cannot replace {}", path.display()));
    }
    Ok(())
}
