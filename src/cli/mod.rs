//! CLI command implementations

pub mod admin;
pub mod award;
pub mod init;
pub mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use progression_engine::config::{Config, ProgressionSettings};
use progression_engine::store::{ProgressionDb, SqliteFacts};
use progression_engine::ProgressionCoordinator;

/// Everything a command needs: effective settings and the database
pub struct Context {
    pub settings: ProgressionSettings,
    pub db_path: PathBuf,
    pub db: ProgressionDb,
}

impl Context {
    /// Resolve config (explicit path, local dir, then global), open the
    /// database and pick the effective settings.
    ///
    /// Each setting stored by the host in `system_settings` takes precedence
    /// over the same key in the config file.
    pub fn load(config_path: Option<&Path>, db_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::from_file(path)?,
            None => match Config::local_config_path(Path::new(".")) {
                Some(path) => Config::from_file(&path)?,
                None => Config::load_global()?,
            },
        };

        let db_path = db_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.database_path());
        let db = ProgressionDb::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        let rows = db.system_settings()?;
        let mut settings = config.progression.clone();
        if !rows.is_empty() {
            info!("Applying {} settings from system_settings", rows.len());
            settings.apply_key_values(rows);
        }
        settings
            .validate()
            .with_context(|| "Invalid progression settings")?;
        debug!(?settings, db = %db_path.display(), "Loaded context");

        Ok(Self {
            settings,
            db_path,
            db,
        })
    }

    pub fn coordinator(&self) -> Result<ProgressionCoordinator> {
        let coordinator =
            ProgressionCoordinator::new(self.db.clone(), self.settings.clone(), Arc::new(SqliteFacts))?;
        Ok(coordinator)
    }
}
