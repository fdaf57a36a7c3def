//! Level curve
//!
//! Each level costs `floor(previous_cost * scaling)` XP more than reaching the
//! previous one, starting from `base_xp_per_level` for level 1 -> 2. Both
//! directions (XP -> level and level -> threshold) walk the same step
//! sequence, so they agree for every input.

use serde::{Deserialize, Serialize};

use crate::config::ProgressionSettings;
use crate::error::{ProgressionError, Result};

/// XP <-> level conversion. Pure and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressionCurve {
    base_xp_per_level: i64,
    scaling_factor: f64,
    max_level: u32,
}

/// Where a user sits inside their current level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub current_level_xp: i64,
    /// 0 at max level
    pub xp_to_next: i64,
}

impl ProgressionCurve {
    pub fn new(base_xp_per_level: i64, scaling_factor: f64, max_level: u32) -> Result<Self> {
        if base_xp_per_level < 1 {
            return Err(ProgressionError::InvalidConfig(format!(
                "base XP per level must be positive, got {}",
                base_xp_per_level
            )));
        }
        if !scaling_factor.is_finite() || scaling_factor < 1.0 {
            return Err(ProgressionError::InvalidConfig(format!(
                "level scaling must be >= 1.0, got {}",
                scaling_factor
            )));
        }
        if max_level < 1 {
            return Err(ProgressionError::InvalidConfig(
                "max level must be at least 1".into(),
            ));
        }
        Ok(Self {
            base_xp_per_level,
            scaling_factor,
            max_level,
        })
    }

    pub fn from_settings(settings: &ProgressionSettings) -> Result<Self> {
        Self::new(
            settings.xp_per_level,
            settings.level_scaling,
            settings.max_level,
        )
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// XP cost of each level-up, starting with 1 -> 2
    fn step_costs(&self) -> impl Iterator<Item = i64> + use<> {
        let scaling = self.scaling_factor;
        std::iter::successors(Some(self.base_xp_per_level), move |&cost| {
            // f64 -> i64 casts saturate, so huge levels pin at i64::MAX
            Some((cost as f64 * scaling).floor() as i64)
        })
    }

    /// Cumulative XP needed to reach `level`.
    ///
    /// Levels above `max_level + 1` are treated as `max_level + 1`.
    pub fn xp_threshold_for_level(&self, level: u32) -> i64 {
        if level <= 1 {
            return 0;
        }
        let level = level.min(self.max_level.saturating_add(1));
        self.step_costs()
            .take((level - 1) as usize)
            .fold(0i64, |total, cost| total.saturating_add(cost))
    }

    /// Level reached with `total_xp` cumulative XP (negative totals count as 0)
    pub fn level_for_xp(&self, total_xp: i64) -> u32 {
        let mut remaining = total_xp.max(0);
        let mut level = 1;

        for cost in self.step_costs() {
            if level >= self.max_level || remaining < cost {
                break;
            }
            remaining -= cost;
            level += 1;
        }

        level
    }

    /// XP earned inside `level` and XP still missing for the next one
    pub fn progress_within_level(&self, total_xp: i64, level: u32) -> LevelProgress {
        let total_xp = total_xp.max(0);
        let level = level.clamp(1, self.max_level);
        let current_level_xp = (total_xp - self.xp_threshold_for_level(level)).max(0);
        let xp_to_next = if level >= self.max_level {
            0
        } else {
            (self.xp_threshold_for_level(level + 1) - total_xp).max(0)
        };

        LevelProgress {
            current_level_xp,
            xp_to_next,
        }
    }

    /// Percentage of the current level completed, 100 at max level
    pub fn progress_percent(&self, total_xp: i64, level: u32) -> f64 {
        let level = level.clamp(1, self.max_level);
        if level >= self.max_level {
            return 100.0;
        }
        let span = self.xp_threshold_for_level(level + 1) - self.xp_threshold_for_level(level);
        let progress = self.progress_within_level(total_xp, level);
        if span <= 0 {
            return 100.0;
        }
        ((progress.current_level_xp as f64 / span as f64) * 100.0).clamp(0.0, 100.0)
    }
}

impl Default for ProgressionCurve {
    fn default() -> Self {
        let settings = ProgressionSettings::default();
        Self {
            base_xp_per_level: settings.xp_per_level,
            scaling_factor: settings.level_scaling,
            max_level: settings.max_level,
        }
    }
}
