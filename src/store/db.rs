//! SQLite database connection and schema management for progression data
//!
//! Manages the `~/.progression/progression.db` database with automatic schema migration.
//! Host tables (users, follows, posts, profiles, system settings) may live in the same
//! file; the engine reads them but never creates or writes them.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

use crate::error::{ProgressionError, Result};
use crate::store::models::UserId;

/// Current schema version written by `run_migrations`
pub const SCHEMA_VERSION: i32 = 3;

/// Database wrapper shared by the coordinator and query layer
#[derive(Clone)]
pub struct ProgressionDb {
    conn: Arc<Mutex<Connection>>,
}

impl ProgressionDb {
    /// Open or create the progression database at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        // WAL lets readers proceed while a reward transaction holds the write lock
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Lock the connection
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ProgressionError::LockPoisoned)
    }

    /// Run `f` inside an IMMEDIATE transaction.
    ///
    /// The write lock is taken up front so two processes cannot interleave the
    /// read-check-write steps of a reward. Any error rolls the whole unit back.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    /// Run any pending migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        let version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )?;

        // Migration 2: running achievement counter on user_levels
        if version < 2 {
            let has_counter: bool = conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('user_levels') WHERE name = 'total_achievements'",
                [],
                |r| r.get::<_, i64>(0),
            )? > 0;

            if !has_counter {
                conn.execute_batch(
                    r#"
                    ALTER TABLE user_levels ADD COLUMN total_achievements INTEGER NOT NULL DEFAULT 0;
                    UPDATE user_levels SET total_achievements = (
                        SELECT COUNT(*) FROM user_achievements ua
                        WHERE ua.user_id = user_levels.user_id AND ua.is_completed = 1
                    );
                    "#,
                )?;
            }

            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
            info!("Progression schema migrated to version 2");
        }

        // Migration 3: activity log is append-only
        if version < 3 {
            conn.execute_batch(
                r#"
                CREATE TRIGGER IF NOT EXISTS user_activity_log_no_update
                BEFORE UPDATE ON user_activity_log
                BEGIN
                    SELECT RAISE(ABORT, 'user_activity_log is append-only');
                END;

                CREATE TRIGGER IF NOT EXISTS user_activity_log_no_delete
                BEFORE DELETE ON user_activity_log
                BEGIN
                    SELECT RAISE(ABORT, 'user_activity_log is append-only');
                END;
                "#,
            )?;

            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (3)", [])?;
            info!("Progression schema migrated to version 3");
        }

        Ok(())
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.conn()?;
        let version = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )?;
        Ok(version)
    }

    /// Read `(setting_key, setting_value)` rows from the host `system_settings` table.
    ///
    /// Returns an empty list when the host table does not exist.
    pub fn system_settings(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn()?;
        if !table_exists(&conn, "system_settings")? {
            debug!("No system_settings table, using configured defaults");
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(
            "SELECT setting_key, COALESCE(setting_value, '') FROM system_settings
             WHERE setting_key LIKE 'achievements\\_%' ESCAPE '\\'",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Users worth checking in a batch: anyone with progression rows plus
    /// active host users when the host `users` table is present
    pub fn known_users(&self) -> Result<Vec<UserId>> {
        let conn = self.conn()?;
        let sql = if table_exists(&conn, "users")? {
            "SELECT user_id FROM user_levels
             UNION SELECT id FROM users WHERE COALESCE(is_active, 1) = 1
             ORDER BY 1"
        } else {
            "SELECT user_id FROM user_levels ORDER BY 1"
        };
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<UserId>>>()?;
        Ok(ids)
    }

    /// Delete all progression state for one user.
    ///
    /// This is the only path that lowers a user's totals. The activity log is kept.
    pub fn reset_user(&self, user_id: UserId) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute("DELETE FROM user_badges WHERE user_id = ?1", params![user_id])?;
            tx.execute("DELETE FROM user_achievements WHERE user_id = ?1", params![user_id])?;
            tx.execute(
                "DELETE FROM achievement_notifications WHERE user_id = ?1",
                params![user_id],
            )?;
            tx.execute("DELETE FROM user_levels WHERE user_id = ?1", params![user_id])?;
            Ok(())
        })?;
        info!(user_id, "Reset progression state");
        Ok(())
    }
}

/// Whether a table is present in the main schema
pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);
INSERT OR IGNORE INTO schema_version VALUES (1);

-- Achievement catalog (admin managed)
CREATE TABLE IF NOT EXISTS achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category_id INTEGER,
    type_id INTEGER,
    requirement_type TEXT NOT NULL,
    requirement_value INTEGER NOT NULL DEFAULT 0,
    requirement_data TEXT,
    xp_reward INTEGER NOT NULL DEFAULT 0 CHECK (xp_reward >= 0),
    points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    rarity TEXT NOT NULL DEFAULT 'common',
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Badge catalog (admin managed, rules live in code)
CREATE TABLE IF NOT EXISTS badges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    rarity TEXT NOT NULL DEFAULT 'common',
    xp_reward INTEGER NOT NULL DEFAULT 0 CHECK (xp_reward >= 0),
    points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Running totals per user
CREATE TABLE IF NOT EXISTS user_levels (
    user_id INTEGER PRIMARY KEY,
    level INTEGER NOT NULL DEFAULT 1,
    total_xp INTEGER NOT NULL DEFAULT 0 CHECK (total_xp >= 0),
    total_points INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0),
    updated_at INTEGER NOT NULL DEFAULT 0
);

-- Per-user achievement state; the unique pair is the completion gate
CREATE TABLE IF NOT EXISTS user_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    achievement_id INTEGER NOT NULL REFERENCES achievements(id) ON DELETE CASCADE,
    progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
    is_completed INTEGER NOT NULL DEFAULT 0,
    completed_at INTEGER,
    UNIQUE (user_id, achievement_id)
);

-- Earned badges; insertion is the award
CREATE TABLE IF NOT EXISTS user_badges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    badge_id INTEGER NOT NULL REFERENCES badges(id) ON DELETE CASCADE,
    earned_at INTEGER NOT NULL,
    UNIQUE (user_id, badge_id)
);

-- Audit trail of every grant
CREATE TABLE IF NOT EXISTS user_activity_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    activity_type TEXT NOT NULL,
    activity_data TEXT,
    xp_earned INTEGER NOT NULL DEFAULT 0,
    points_earned INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS achievement_notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    achievement_id INTEGER,
    notification_type TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_achievements_active ON achievements(is_active, sort_order);
CREATE INDEX IF NOT EXISTS idx_user_achievements_user ON user_achievements(user_id, is_completed);
CREATE INDEX IF NOT EXISTS idx_user_badges_user ON user_badges(user_id);
CREATE INDEX IF NOT EXISTS idx_activity_user_type ON user_activity_log(user_id, activity_type);
CREATE INDEX IF NOT EXISTS idx_notifications_user ON achievement_notifications(user_id, is_read);
CREATE INDEX IF NOT EXISTS idx_user_levels_rank ON user_levels(total_xp DESC, level DESC);
"#;
