//! Reward ledger: scales raw grants and appends them to the activity log
//!
//! The ledger never touches running totals or levels; the coordinator applies
//! the granted amounts.

use rusqlite::Connection;
use tracing::debug;

use crate::config::ProgressionSettings;
use crate::error::{ProgressionError, Result};
use crate::store::models::UserId;
use crate::store::progress;

/// Amounts actually granted after multipliers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Grant {
    pub xp: i64,
    pub points: i64,
}

impl Grant {
    pub fn is_empty(&self) -> bool {
        self.xp == 0 && self.points == 0
    }
}

#[derive(Debug, Clone)]
pub struct RewardLedger {
    enabled: bool,
    level_system_enabled: bool,
    xp_multiplier: f64,
    points_multiplier: f64,
}

impl RewardLedger {
    pub fn new(settings: &ProgressionSettings) -> Self {
        Self {
            enabled: settings.enabled,
            level_system_enabled: settings.level_system_enabled,
            xp_multiplier: settings.xp_multiplier,
            points_multiplier: settings.points_multiplier,
        }
    }

    /// Whether XP grants currently do anything
    pub fn xp_enabled(&self) -> bool {
        self.enabled && self.level_system_enabled
    }

    pub fn points_enabled(&self) -> bool {
        self.enabled
    }

    /// Scale and log an XP grant. Returns 0 without logging when XP is switched off.
    pub fn grant_xp(
        &self,
        conn: &Connection,
        user_id: UserId,
        raw_amount: i64,
        activity_type: &str,
        activity_data: Option<&serde_json::Value>,
    ) -> Result<i64> {
        validate(raw_amount, 0, activity_type)?;
        if !self.xp_enabled() {
            return Ok(0);
        }

        let xp = scale(raw_amount, self.xp_multiplier);
        self.log(conn, user_id, activity_type, activity_data, Grant { xp, points: 0 })?;
        Ok(xp)
    }

    /// Scale and log a points grant. Returns 0 without logging when disabled.
    pub fn grant_points(
        &self,
        conn: &Connection,
        user_id: UserId,
        raw_amount: i64,
        activity_type: &str,
        activity_data: Option<&serde_json::Value>,
    ) -> Result<i64> {
        validate(0, raw_amount, activity_type)?;
        if !self.points_enabled() {
            return Ok(0);
        }

        let points = scale(raw_amount, self.points_multiplier);
        self.log(conn, user_id, activity_type, activity_data, Grant { xp: 0, points })?;
        Ok(points)
    }

    /// Scale both currencies and write a single log entry for them.
    ///
    /// With the level system off only the points half is granted, and nothing
    /// is logged when that half is zero as well.
    pub fn grant(
        &self,
        conn: &Connection,
        user_id: UserId,
        raw_xp: i64,
        raw_points: i64,
        activity_type: &str,
        activity_data: Option<&serde_json::Value>,
    ) -> Result<Grant> {
        validate(raw_xp, raw_points, activity_type)?;
        if !self.enabled || (!self.level_system_enabled && raw_points == 0) {
            return Ok(Grant::default());
        }

        let grant = Grant {
            xp: if self.xp_enabled() {
                scale(raw_xp, self.xp_multiplier)
            } else {
                0
            },
            points: scale(raw_points, self.points_multiplier),
        };
        self.log(conn, user_id, activity_type, activity_data, grant)?;
        Ok(grant)
    }

    fn log(
        &self,
        conn: &Connection,
        user_id: UserId,
        activity_type: &str,
        activity_data: Option<&serde_json::Value>,
        grant: Grant,
    ) -> Result<()> {
        progress::append_activity(
            conn,
            user_id,
            activity_type,
            activity_data,
            grant.xp,
            grant.points,
        )?;
        debug!(user_id, activity_type, xp = grant.xp, points = grant.points, "Logged grant");
        Ok(())
    }
}

fn validate(raw_xp: i64, raw_points: i64, activity_type: &str) -> Result<()> {
    if raw_xp < 0 || raw_points < 0 {
        return Err(ProgressionError::Validation(format!(
            "negative reward for {}: xp={} points={}",
            activity_type, raw_xp, raw_points
        )));
    }
    if activity_type.trim().is_empty() {
        return Err(ProgressionError::Validation("activity_type is required".into()));
    }
    Ok(())
}

/// Apply a multiplier and floor
fn scale(raw: i64, multiplier: f64) -> i64 {
    (raw as f64 * multiplier).floor().max(0.0) as i64
}
