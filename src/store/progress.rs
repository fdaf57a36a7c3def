//! Engine-owned row writes
//!
//! Every function takes the caller's connection (normally an open transaction)
//! so a whole reward sequence commits or rolls back as one unit.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::store::models::{NewNotification, UserId, UserLevel};

/// Current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Totals right after an atomic increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsUpdate {
    /// Stored level before the increment
    pub previous_level: u32,
    pub total_xp: i64,
    pub total_points: i64,
}

/// Create the user's level row if this is their first reward
pub fn ensure_user_level(conn: &Connection, user_id: UserId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_levels (user_id, updated_at) VALUES (?1, ?2)",
        params![user_id, now_ms()],
    )?;
    Ok(())
}

pub fn user_level(conn: &Connection, user_id: UserId) -> Result<Option<UserLevel>> {
    let row = conn
        .query_row(
            "SELECT user_id, level, total_xp, total_points, total_achievements, updated_at
             FROM user_levels WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserLevel {
                    user_id: row.get(0)?,
                    level: row.get(1)?,
                    total_xp: row.get(2)?,
                    total_points: row.get(3)?,
                    total_achievements: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Add to the running totals and read them back in one statement.
///
/// The increment happens in SQL so concurrent writers never overwrite each other.
pub fn add_totals(conn: &Connection, user_id: UserId, xp: i64, points: i64) -> Result<TotalsUpdate> {
    ensure_user_level(conn, user_id)?;
    let update = conn.query_row(
        "UPDATE user_levels
         SET total_xp = total_xp + ?2, total_points = total_points + ?3, updated_at = ?4
         WHERE user_id = ?1
         RETURNING level, total_xp, total_points",
        params![user_id, xp, points, now_ms()],
        |row| {
            Ok(TotalsUpdate {
                previous_level: row.get(0)?,
                total_xp: row.get(1)?,
                total_points: row.get(2)?,
            })
        },
    )?;
    Ok(update)
}

/// Store the level derived from the current total
pub fn set_level(conn: &Connection, user_id: UserId, level: u32) -> Result<()> {
    conn.execute(
        "UPDATE user_levels SET level = ?2 WHERE user_id = ?1",
        params![user_id, level],
    )?;
    Ok(())
}

/// Flip an achievement to completed for a user.
///
/// Returns `true` only for the call that performed the transition. The unique
/// (user_id, achievement_id) pair plus the `is_completed = 0` guard make this
/// an atomic insert-if-absent.
pub fn mark_completed(conn: &Connection, user_id: UserId, achievement_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO user_achievements (user_id, achievement_id, progress, is_completed, completed_at)
         VALUES (?1, ?2, 100, 1, ?3)
         ON CONFLICT(user_id, achievement_id) DO UPDATE SET
             progress = 100, is_completed = 1, completed_at = excluded.completed_at
         WHERE user_achievements.is_completed = 0",
        params![user_id, achievement_id, now_ms()],
    )?;

    if changed == 0 {
        return Ok(false);
    }

    ensure_user_level(conn, user_id)?;
    conn.execute(
        "UPDATE user_levels SET total_achievements = total_achievements + 1 WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(true)
}

/// Record informational progress on an achievement that is not complete yet
pub fn record_progress(
    conn: &Connection,
    user_id: UserId,
    achievement_id: i64,
    progress: u8,
) -> Result<()> {
    conn.execute(
        "INSERT INTO user_achievements (user_id, achievement_id, progress)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, achievement_id) DO UPDATE SET progress = excluded.progress
         WHERE user_achievements.is_completed = 0",
        params![user_id, achievement_id, progress.min(99)],
    )?;
    Ok(())
}

pub fn completed_achievement_ids(conn: &Connection, user_id: UserId) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare(
        "SELECT achievement_id FROM user_achievements WHERE user_id = ?1 AND is_completed = 1",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<i64>>>()?;
    Ok(ids)
}

pub fn is_completed(conn: &Connection, user_id: UserId, achievement_id: i64) -> Result<bool> {
    let completed: Option<bool> = conn
        .query_row(
            "SELECT is_completed FROM user_achievements WHERE user_id = ?1 AND achievement_id = ?2",
            params![user_id, achievement_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(completed.unwrap_or(false))
}

/// Completed achievements, optionally restricted to one category
pub fn completed_count(conn: &Connection, user_id: UserId, category_id: Option<i64>) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM user_achievements ua
         JOIN achievements a ON a.id = ua.achievement_id
         WHERE ua.user_id = ?1 AND ua.is_completed = 1
           AND (?2 IS NULL OR a.category_id = ?2)",
        params![user_id, category_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Number of logged activities of one type
pub fn activity_count(conn: &Connection, user_id: UserId, activity_type: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM user_activity_log WHERE user_id = ?1 AND activity_type = ?2",
        params![user_id, activity_type],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Append one grant to the activity log
pub fn append_activity(
    conn: &Connection,
    user_id: UserId,
    activity_type: &str,
    activity_data: Option<&serde_json::Value>,
    xp_earned: i64,
    points_earned: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO user_activity_log
             (user_id, activity_type, activity_data, xp_earned, points_earned, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            activity_type,
            activity_data.map(|v| v.to_string()),
            xp_earned,
            points_earned,
            now_ms(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn owned_badge_ids(conn: &Connection, user_id: UserId) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT badge_id FROM user_badges WHERE user_id = ?1")?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<i64>>>()?;
    Ok(ids)
}

/// Insert a badge for a user; `false` when they already hold it
pub fn insert_badge_if_absent(conn: &Connection, user_id: UserId, badge_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO user_badges (user_id, badge_id, earned_at) VALUES (?1, ?2, ?3)",
        params![user_id, badge_id, now_ms()],
    )?;
    Ok(changed == 1)
}

pub fn insert_notification(conn: &Connection, notification: &NewNotification) -> Result<i64> {
    conn.execute(
        "INSERT INTO achievement_notifications
             (user_id, achievement_id, notification_type, title, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            notification.user_id,
            notification.achievement_id,
            notification.kind.as_str(),
            notification.title,
            notification.message,
            now_ms(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProgressionDb;
    use crate::store::catalog::{AchievementDef, upsert_achievement};

    fn seed_achievement(conn: &Connection, slug: &str) -> i64 {
        upsert_achievement(
            conn,
            &AchievementDef {
                slug: slug.to_string(),
                name: slug.to_string(),
                description: String::new(),
                category_id: Some(7),
                type_id: None,
                requirement_type: "first_login".to_string(),
                requirement_value: 0,
                requirement_data: None,
                xp_reward: 10,
                points: 1,
                rarity: None,
                sort_order: 0,
                is_active: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_add_totals_accumulates() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();

        let first = add_totals(&conn, 1, 40, 3).unwrap();
        assert_eq!(first.previous_level, 1);
        assert_eq!(first.total_xp, 40);

        let second = add_totals(&conn, 1, 60, 2).unwrap();
        assert_eq!(second.total_xp, 100);
        assert_eq!(second.total_points, 5);
    }

    #[test]
    fn test_mark_completed_only_once() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let id = seed_achievement(&conn, "first-steps");

        record_progress(&conn, 1, id, 40).unwrap();
        assert!(!is_completed(&conn, 1, id).unwrap());

        assert!(mark_completed(&conn, 1, id).unwrap());
        assert!(!mark_completed(&conn, 1, id).unwrap());
        assert!(is_completed(&conn, 1, id).unwrap());

        // Progress writes never reopen a completed row
        record_progress(&conn, 1, id, 10).unwrap();
        assert!(is_completed(&conn, 1, id).unwrap());

        assert_eq!(completed_count(&conn, 1, None).unwrap(), 1);
        assert_eq!(completed_count(&conn, 1, Some(7)).unwrap(), 1);
        assert_eq!(completed_count(&conn, 1, Some(8)).unwrap(), 0);
        assert_eq!(user_level(&conn, 1).unwrap().unwrap().total_achievements, 1);
    }

    #[test]
    fn test_badge_insert_if_absent() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        conn.execute(
            "INSERT INTO badges (slug, name) VALUES ('wordsmith', 'Wordsmith')",
            [],
        )
        .unwrap();
        let badge_id = conn.last_insert_rowid();

        assert!(insert_badge_if_absent(&conn, 3, badge_id).unwrap());
        assert!(!insert_badge_if_absent(&conn, 3, badge_id).unwrap());
        assert_eq!(owned_badge_ids(&conn, 3).unwrap().len(), 1);
    }

    #[test]
    fn test_activity_count() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let data = serde_json::json!({ "page": 12 });

        append_activity(&conn, 1, "wiki_visit", Some(&data), 2, 0).unwrap();
        append_activity(&conn, 1, "wiki_visit", None, 2, 0).unwrap();
        append_activity(&conn, 1, "user_login", None, 5, 0).unwrap();

        assert_eq!(activity_count(&conn, 1, "wiki_visit").unwrap(), 2);
        assert_eq!(activity_count(&conn, 2, "wiki_visit").unwrap(), 0);
    }
}
