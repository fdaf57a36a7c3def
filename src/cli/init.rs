//! Init command implementation

use anyhow::{Result, bail};
use std::path::Path;
use tracing::info;

use progression_engine::Config;

/// Default configuration content for progression init
pub const DEFAULT_CONFIG: &str = r#"# Progression engine configuration
# ===============================

# ============================================================================
# DATABASE
# ============================================================================
#
#   path - SQLite file shared with the host site (default: ~/.progression/progression.db)

[database]
# path = "/var/lib/wiki/site.db"

# ============================================================================
# PROGRESSION
# ============================================================================
#
# Values stored by the site in its system_settings table (achievements_*)
# override everything below.
#
#   enabled               - Master switch (default: false)
#   xp_multiplier         - Applied to every XP grant, 0.1-5.0 (default: 1.0)
#   points_multiplier     - Applied to every points grant, 0.1-5.0 (default: 1.0)
#   notifications_enabled - Store level-up / unlock notifications (default: true)
#   level_system_enabled  - When false, XP grants are skipped (default: true)
#   max_level             - 1-1000 (default: 100)
#   xp_per_level          - XP from level 1 to 2 (default: 500)
#   level_scaling         - Growth of each next level's cost, 1.0-2.0 (default: 1.3)

[progression]
enabled = true
xp_multiplier = 1.0
points_multiplier = 1.0
notifications_enabled = true
level_system_enabled = true
max_level = 100
xp_per_level = 500
level_scaling = 1.3
"#;

/// Write .progression/config.toml in `work_dir`
pub fn init_command(work_dir: &Path, force: bool) -> Result<()> {
    let config_dir = work_dir.join(".progression");
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, DEFAULT_CONFIG)?;

    info!("Created config file: {}", config_path.display());
    println!("Created {}", config_path.display());
    Ok(())
}

/// Write ~/.progression/config.toml with the default settings
pub fn init_global_command(force: bool) -> Result<()> {
    let config_path = Config::global_config_path();
    if config_path.exists() && !force {
        bail!(
            "Global config already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    Config::with_defaults().save_to_file(&config_path)?;

    info!("Created global config: {}", config_path.display());
    println!("Created {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses() {
        let dir = TempDir::new().unwrap();
        init_command(dir.path(), false).unwrap();

        let config = Config::from_dir(dir.path()).unwrap();
        assert!(config.progression.enabled);
        assert_eq!(config.progression.max_level, 100);

        assert!(init_command(dir.path(), false).is_err());
        assert!(init_command(dir.path(), true).is_ok());
    }
}
