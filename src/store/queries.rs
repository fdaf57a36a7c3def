//! Read accessors for progression data
//!
//! Levels are recomputed from `total_xp` on every read, so a stale cached
//! level column never leaks to callers.

use rusqlite::{Connection, params};

use super::catalog::{ACHIEVEMENT_COLUMNS, BADGE_COLUMNS, achievement_from_row, badge_from_row};
use super::db::ProgressionDb;
use super::models::{
    AchievementStats, ActivityLogEntry, CompletionCount, EngineStatus, LeaderboardEntry, LevelView,
    Notification, Rarity, UserAchievement, UserBadge, UserId,
};
use super::progress;
use crate::error::{ProgressionError, Result};
use crate::progression::curve::ProgressionCurve;

/// Query interface for progression data
#[derive(Clone)]
pub struct ProgressQuery {
    db: ProgressionDb,
    curve: ProgressionCurve,
}

impl ProgressQuery {
    pub fn new(db: ProgressionDb, curve: ProgressionCurve) -> Self {
        Self { db, curve }
    }

    /// Level, totals and in-level progress. Users without rewards read as level 1.
    pub fn get_user_level(&self, user_id: UserId) -> Result<LevelView> {
        let conn = self.db.conn()?;
        let row = progress::user_level(&conn, user_id)?;

        let (total_xp, total_points, total_achievements) = row
            .map(|r| (r.total_xp, r.total_points, r.total_achievements))
            .unwrap_or((0, 0, 0));

        let level = self.curve.level_for_xp(total_xp);
        let within = self.curve.progress_within_level(total_xp, level);

        Ok(LevelView {
            user_id,
            level,
            total_xp,
            total_points,
            total_achievements,
            current_level_xp: within.current_level_xp,
            xp_to_next_level: within.xp_to_next,
            progress_percent: self.curve.progress_percent(total_xp, level),
        })
    }

    /// Every active achievement with the user's state, completed ones first
    pub fn get_user_achievements(&self, user_id: UserId) -> Result<Vec<UserAchievement>> {
        let conn = self.db.conn()?;
        let sql = format!(
            "SELECT {}, COALESCE(ua.progress, 0), COALESCE(ua.is_completed, 0), ua.completed_at
             FROM achievements a
             LEFT JOIN user_achievements ua ON ua.achievement_id = a.id AND ua.user_id = ?1
             WHERE a.is_active = 1
             ORDER BY COALESCE(ua.is_completed, 0) DESC, a.sort_order, a.id",
            ACHIEVEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(UserAchievement {
                    user_id,
                    achievement: achievement_from_row(row, 0)?,
                    progress: row.get(14)?,
                    is_completed: row.get(15)?,
                    completed_at: row.get(16)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Badges the user holds, newest first
    pub fn get_user_badges(&self, user_id: UserId) -> Result<Vec<UserBadge>> {
        let conn = self.db.conn()?;
        let sql = format!(
            "SELECT {}, ub.earned_at
             FROM user_badges ub
             JOIN badges b ON b.id = ub.badge_id
             WHERE ub.user_id = ?1
             ORDER BY ub.earned_at DESC, b.sort_order",
            BADGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(UserBadge {
                    user_id,
                    badge: badge_from_row(row, 0)?,
                    earned_at: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Top users by XP, optionally only those with a completion in `category_id`
    pub fn get_leaderboard(&self, limit: usize, category_id: Option<i64>) -> Result<Vec<LeaderboardEntry>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ul.user_id, ul.total_xp, ul.total_points, ul.total_achievements
             FROM user_levels ul
             WHERE ?1 IS NULL OR ul.user_id IN (
                 SELECT DISTINCT ua.user_id
                 FROM user_achievements ua
                 JOIN achievements a ON a.id = ua.achievement_id
                 WHERE a.category_id = ?1 AND ua.is_completed = 1
             )
             ORDER BY ul.total_xp DESC, ul.level DESC, ul.total_achievements DESC, ul.user_id
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![category_id, limit as i64], |row| {
                Ok((
                    row.get::<_, UserId>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (user_id, total_xp, total_points, total_achievements))| LeaderboardEntry {
                rank: i + 1,
                user_id,
                level: self.curve.level_for_xp(total_xp),
                total_xp,
                total_points,
                total_achievements,
            })
            .collect())
    }

    /// Latest notifications for a user
    pub fn get_notifications(
        &self,
        user_id: UserId,
        limit: usize,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, achievement_id, notification_type, title, message, is_read, created_at
             FROM achievement_notifications
             WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![user_id, unread_only, limit as i64], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    achievement_id: row.get(2)?,
                    kind: row.get(3)?,
                    title: row.get(4)?,
                    message: row.get(5)?,
                    is_read: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Mark one of the user's notifications read
    pub fn mark_notification_read(&self, user_id: UserId, notification_id: i64) -> Result<()> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE achievement_notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
            params![notification_id, user_id],
        )?;
        if changed == 0 {
            return Err(ProgressionError::NotFound(format!(
                "notification #{} for user {}",
                notification_id, user_id
            )));
        }
        Ok(())
    }

    /// Completion counts overall, per category and per rarity
    pub fn get_achievement_stats(&self, user_id: UserId) -> Result<AchievementStats> {
        let conn = self.db.conn()?;

        let overall = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(COALESCE(ua.is_completed, 0)), 0)
             FROM achievements a
             LEFT JOIN user_achievements ua ON ua.achievement_id = a.id AND ua.user_id = ?1
             WHERE a.is_active = 1",
            params![user_id],
            |r| {
                Ok(CompletionCount {
                    total: r.get(0)?,
                    completed: r.get(1)?,
                })
            },
        )?;

        let by_category = grouped_counts::<i64>(&conn, user_id, "a.category_id")?;

        let raw_rarity = grouped_counts::<String>(&conn, user_id, "a.rarity")?;
        let by_rarity = Rarity::all()
            .iter()
            .map(|rarity| {
                let count = raw_rarity
                    .iter()
                    .find(|(key, _)| key.as_deref() == Some(rarity.as_str()))
                    .map(|(_, c)| c.clone())
                    .unwrap_or_default();
                (*rarity, count)
            })
            .collect();

        Ok(AchievementStats {
            overall,
            by_category,
            by_rarity,
        })
    }

    /// Most recent activity log entries
    pub fn get_activity_log(&self, user_id: UserId, limit: usize) -> Result<Vec<ActivityLogEntry>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, activity_type, activity_data, xp_earned, points_earned, created_at
             FROM user_activity_log
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(ActivityLogEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    activity_type: row.get(2)?,
                    activity_data: row.get(3)?,
                    xp_earned: row.get(4)?,
                    points_earned: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Engine-wide counters
    pub fn get_status(&self) -> Result<EngineStatus> {
        let conn = self.db.conn()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        Ok(EngineStatus {
            active_achievements: count("SELECT COUNT(*) FROM achievements WHERE is_active = 1")?,
            active_badges: count("SELECT COUNT(*) FROM badges WHERE is_active = 1")?,
            ranked_users: count("SELECT COUNT(*) FROM user_levels")?,
            completions: count("SELECT COUNT(*) FROM user_achievements WHERE is_completed = 1")?,
            badges_awarded: count("SELECT COUNT(*) FROM user_badges")?,
        })
    }
}

/// Per-group completion counts over active achievements
fn grouped_counts<K: rusqlite::types::FromSql>(
    conn: &Connection,
    user_id: UserId,
    group_column: &str,
) -> Result<Vec<(Option<K>, CompletionCount)>> {
    let sql = format!(
        "SELECT {col}, COUNT(*), COALESCE(SUM(COALESCE(ua.is_completed, 0)), 0)
         FROM achievements a
         LEFT JOIN user_achievements ua ON ua.achievement_id = a.id AND ua.user_id = ?1
         WHERE a.is_active = 1
         GROUP BY {col}
         ORDER BY {col}",
        col = group_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok((
                row.get::<_, Option<K>>(0)?,
                CompletionCount {
                    total: row.get(1)?,
                    completed: row.get(2)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
