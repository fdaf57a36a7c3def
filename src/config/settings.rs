//! Settings configuration types

use serde::{Deserialize, Serialize};

use crate::error::{ProgressionError, Result};

/// Progression settings
///
/// Handed to the coordinator once at construction; the engine never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSettings {
    /// Master switch for XP, points, achievements and badges
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Multiplier applied to every raw XP grant (result is floored)
    #[serde(default = "default_multiplier")]
    pub xp_multiplier: f64,

    /// Multiplier applied to every raw points grant (result is floored)
    #[serde(default = "default_multiplier")]
    pub points_multiplier: f64,

    /// Persist level-up / unlock notifications
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    /// When false, XP grants are no-ops while points keep flowing
    #[serde(default = "default_true")]
    pub level_system_enabled: bool,

    #[serde(default = "default_max_level")]
    pub max_level: u32,

    /// XP needed to go from level 1 to level 2
    #[serde(default = "default_xp_per_level")]
    pub xp_per_level: i64,

    /// Growth factor of the per-level XP cost
    #[serde(default = "default_level_scaling")]
    pub level_scaling: f64,
}

fn default_enabled() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_max_level() -> u32 {
    100
}

fn default_xp_per_level() -> i64 {
    500
}

fn default_level_scaling() -> f64 {
    1.3
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            xp_multiplier: default_multiplier(),
            points_multiplier: default_multiplier(),
            notifications_enabled: default_true(),
            level_system_enabled: default_true(),
            max_level: default_max_level(),
            xp_per_level: default_xp_per_level(),
            level_scaling: default_level_scaling(),
        }
    }
}

impl ProgressionSettings {
    /// Key prefix used by the host's `system_settings` table
    pub const KEY_PREFIX: &'static str = "achievements_";

    /// Defaults with the system switched on
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Check that every value sits inside the range the admin form allows
    pub fn validate(&self) -> Result<()> {
        if !(0.1..=5.0).contains(&self.xp_multiplier) {
            return Err(ProgressionError::InvalidConfig(format!(
                "xp_multiplier must be between 0.1 and 5.0, got {}",
                self.xp_multiplier
            )));
        }
        if !(0.1..=5.0).contains(&self.points_multiplier) {
            return Err(ProgressionError::InvalidConfig(format!(
                "points_multiplier must be between 0.1 and 5.0, got {}",
                self.points_multiplier
            )));
        }
        if !(1..=1000).contains(&self.max_level) {
            return Err(ProgressionError::InvalidConfig(format!(
                "max_level must be between 1 and 1000, got {}",
                self.max_level
            )));
        }
        if !(1..=100_000).contains(&self.xp_per_level) {
            return Err(ProgressionError::InvalidConfig(format!(
                "xp_per_level must be between 1 and 100000, got {}",
                self.xp_per_level
            )));
        }
        if !(1.0..=2.0).contains(&self.level_scaling) {
            return Err(ProgressionError::InvalidConfig(format!(
                "level_scaling must be between 1.0 and 2.0, got {}",
                self.level_scaling
            )));
        }
        Ok(())
    }

    /// Build settings from `achievements_*` key-value rows on top of the defaults
    pub fn from_key_values<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        settings.apply_key_values(rows);
        settings
    }

    /// Override individual settings from `achievements_*` key-value rows.
    ///
    /// Keys that are absent leave the current value alone. Unknown keys are
    /// ignored and unparseable values keep the current value.
    pub fn apply_key_values<I, K, V>(&mut self, rows: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in rows {
            let Some(name) = key.as_ref().strip_prefix(Self::KEY_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();

            match name {
                "enabled" => apply(&mut self.enabled, parse_bool(value)),
                "xp_multiplier" => apply(&mut self.xp_multiplier, value.parse().ok()),
                "points_multiplier" => apply(&mut self.points_multiplier, value.parse().ok()),
                "notifications_enabled" => apply(&mut self.notifications_enabled, parse_bool(value)),
                "level_system_enabled" => apply(&mut self.level_system_enabled, parse_bool(value)),
                "max_level" => apply(&mut self.max_level, value.parse().ok()),
                "xp_per_level" => apply(&mut self.xp_per_level, value.parse().ok()),
                "level_scaling" => apply(&mut self.level_scaling, value.parse().ok()),
                other => tracing::debug!("Ignoring unknown setting {}{}", Self::KEY_PREFIX, other),
            }
        }
    }
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database (defaults to ~/.progression/progression.db)
    #[serde(default)]
    pub path: Option<std::path::PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_host_defaults() {
        let settings = ProgressionSettings::default();
        assert!(!settings.enabled);
        assert!(settings.notifications_enabled);
        assert!(settings.level_system_enabled);
        assert_eq!(settings.max_level, 100);
        assert_eq!(settings.xp_per_level, 500);
        assert!((settings.level_scaling - 1.3).abs() < f64::EPSILON);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_key_values() {
        let rows = vec![
            ("achievements_enabled", "1"),
            ("achievements_xp_multiplier", "2.5"),
            ("achievements_level_system_enabled", "false"),
            ("achievements_max_level", "not-a-number"),
            ("site_name", "ignored"),
        ];
        let settings = ProgressionSettings::from_key_values(rows);

        assert!(settings.enabled);
        assert!((settings.xp_multiplier - 2.5).abs() < f64::EPSILON);
        assert!(!settings.level_system_enabled);
        assert_eq!(settings.max_level, 100);
    }

    #[test]
    fn test_apply_key_values_overrides_per_key() {
        let mut settings = ProgressionSettings {
            xp_multiplier: 2.0,
            xp_per_level: 100,
            ..ProgressionSettings::enabled()
        };

        settings.apply_key_values([
            ("achievements_notifications_enabled", "0"),
            ("achievements_max_level", "not-a-number"),
        ]);

        assert!(settings.enabled);
        assert!(!settings.notifications_enabled);
        assert_eq!(settings.xp_multiplier, 2.0);
        assert_eq!(settings.xp_per_level, 100);
        assert_eq!(settings.max_level, 100);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut settings = ProgressionSettings::default();
        settings.level_scaling = 0.9;
        assert!(matches!(
            settings.validate(),
            Err(ProgressionError::InvalidConfig(_))
        ));

        let mut settings = ProgressionSettings::default();
        settings.xp_multiplier = 10.0;
        assert!(settings.validate().is_err());

        let mut settings = ProgressionSettings::default();
        settings.max_level = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: ProgressionSettings = toml::from_str("enabled = true\nmax_level = 50\n").unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.max_level, 50);
        assert_eq!(settings.xp_per_level, 500);
    }
}
