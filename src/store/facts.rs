//! Aggregate facts about users, read from the host application's tables
//!
//! Requirement evaluation only ever asks for one scalar at a time. The provider
//! receives the caller's connection so facts are read inside the same
//! transaction as the reward that triggered the check.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::warn;

use crate::error::{ProgressionError, Result};
use crate::store::db::table_exists;
use crate::store::models::UserId;

/// A scalar fact about one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserFact {
    /// Accepted follow relationships in either direction
    FriendCount,
    /// Public posts of any type
    PostCount,
    /// Posts shared as articles
    ArticleCount,
    /// Plain status updates
    StatusCount,
    /// 1 when the user has uploaded an avatar
    PhotoCount,
    DaysSinceJoin,
    /// 1 when display name, avatar, bio and location are all filled in
    ProfileComplete,
}

impl UserFact {
    /// Host tables this fact reads
    fn tables(&self) -> &'static [&'static str] {
        match self {
            Self::FriendCount => &["user_follows"],
            Self::PostCount | Self::ArticleCount | Self::StatusCount => &["user_posts"],
            Self::PhotoCount | Self::DaysSinceJoin => &["users"],
            Self::ProfileComplete => &["users", "user_profiles"],
        }
    }

    /// Parameterized query producing the fact for `?1 = user_id`
    fn sql(&self) -> &'static str {
        match self {
            Self::FriendCount => {
                "SELECT COUNT(*) FROM user_follows
                 WHERE (follower_id = ?1 OR following_id = ?1) AND status = 'accepted'"
            }
            Self::PostCount => "SELECT COUNT(*) FROM user_posts WHERE user_id = ?1 AND is_public = 1",
            Self::ArticleCount => {
                "SELECT COUNT(*) FROM user_posts WHERE user_id = ?1 AND post_type = 'article_share'"
            }
            Self::StatusCount => {
                "SELECT COUNT(*) FROM user_posts WHERE user_id = ?1 AND post_type = 'status'"
            }
            Self::PhotoCount => {
                "SELECT COUNT(*) FROM users
                 WHERE id = ?1 AND avatar IS NOT NULL AND TRIM(avatar) != ''"
            }
            Self::DaysSinceJoin => {
                "SELECT COALESCE(CAST(julianday('now') - julianday(created_at) AS INTEGER), 0)
                 FROM users WHERE id = ?1"
            }
            Self::ProfileComplete => {
                "SELECT COUNT(*) FROM users u
                 JOIN user_profiles p ON p.user_id = u.id
                 WHERE u.id = ?1
                   AND TRIM(COALESCE(u.display_name, '')) != ''
                   AND TRIM(COALESCE(u.avatar, '')) != ''
                   AND TRIM(COALESCE(p.bio, '')) != ''
                   AND TRIM(COALESCE(p.location, '')) != ''"
            }
        }
    }
}

/// Source of user facts
pub trait FactProvider: Send + Sync {
    fn fact(&self, conn: &Connection, user_id: UserId, fact: UserFact) -> Result<i64>;
}

/// Facts computed from host tables living in the progression database file.
///
/// A host table that does not exist yet reads as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFacts;

impl FactProvider for SqliteFacts {
    fn fact(&self, conn: &Connection, user_id: UserId, fact: UserFact) -> Result<i64> {
        for table in fact.tables() {
            if !table_exists(conn, table)? {
                warn!(?fact, table, "Host table missing, treating fact as 0");
                return Ok(0);
            }
        }

        // DaysSinceJoin has no row for unknown users
        let value: Option<i64> = conn
            .query_row(fact.sql(), params![user_id], |r| r.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value.unwrap_or(0).max(0))
    }
}

/// In-memory facts, for tests and for callers that already hold the numbers
#[derive(Debug, Default)]
pub struct StaticFacts {
    values: Mutex<HashMap<(UserId, UserFact), i64>>,
}

impl StaticFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(self, user_id: UserId, fact: UserFact, value: i64) -> Self {
        self.set(user_id, fact, value);
        self
    }

    pub fn set(&self, user_id: UserId, fact: UserFact, value: i64) {
        if let Ok(mut values) = self.values.lock() {
            values.insert((user_id, fact), value);
        }
    }
}

impl FactProvider for StaticFacts {
    fn fact(&self, _conn: &Connection, user_id: UserId, fact: UserFact) -> Result<i64> {
        let values = self
            .values
            .lock()
            .map_err(|_| ProgressionError::FactSource("static facts lock poisoned".into()))?;
        Ok(values.get(&(user_id, fact)).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_SCHEMA: &str = r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY, display_name TEXT, avatar TEXT,
            created_at TEXT, last_login TEXT
        );
        CREATE TABLE user_profiles (user_id INTEGER PRIMARY KEY, bio TEXT, location TEXT);
        CREATE TABLE user_follows (follower_id INTEGER, following_id INTEGER, status TEXT);
        CREATE TABLE user_posts (user_id INTEGER, post_type TEXT, is_public INTEGER);
    "#;

    fn host_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(HOST_SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_missing_tables_read_as_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::FriendCount).unwrap(), 0);
        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::ProfileComplete).unwrap(), 0);
    }

    #[test]
    fn test_friend_and_post_counts() {
        let conn = host_db();
        conn.execute_batch(
            r#"
            INSERT INTO user_follows VALUES (1, 2, 'accepted');
            INSERT INTO user_follows VALUES (3, 1, 'accepted');
            INSERT INTO user_follows VALUES (1, 4, 'pending');
            INSERT INTO user_posts VALUES (1, 'status', 1);
            INSERT INTO user_posts VALUES (1, 'article_share', 1);
            INSERT INTO user_posts VALUES (1, 'status', 0);
            "#,
        )
        .unwrap();

        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::FriendCount).unwrap(), 2);
        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::PostCount).unwrap(), 2);
        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::ArticleCount).unwrap(), 1);
        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::StatusCount).unwrap(), 2);
    }

    #[test]
    fn test_profile_and_join_facts() {
        let conn = host_db();
        conn.execute_batch(
            r#"
            INSERT INTO users VALUES (1, 'Amina', 'a.png', datetime('now', '-400 days'), datetime('now'));
            INSERT INTO user_profiles VALUES (1, 'Writer', 'Cairo');
            INSERT INTO users VALUES (2, 'Omar', '', datetime('now'), NULL);
            INSERT INTO user_profiles VALUES (2, 'Reader', '');
            "#,
        )
        .unwrap();

        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::ProfileComplete).unwrap(), 1);
        assert_eq!(SqliteFacts.fact(&conn, 1, UserFact::PhotoCount).unwrap(), 1);
        assert!(SqliteFacts.fact(&conn, 1, UserFact::DaysSinceJoin).unwrap() >= 399);

        assert_eq!(SqliteFacts.fact(&conn, 2, UserFact::ProfileComplete).unwrap(), 0);
        assert_eq!(SqliteFacts.fact(&conn, 2, UserFact::PhotoCount).unwrap(), 0);
        assert_eq!(SqliteFacts.fact(&conn, 99, UserFact::DaysSinceJoin).unwrap(), 0);
    }

    #[test]
    fn test_static_facts() {
        let conn = Connection::open_in_memory().unwrap();
        let facts = StaticFacts::new().with(1, UserFact::PostCount, 12);
        assert_eq!(facts.fact(&conn, 1, UserFact::PostCount).unwrap(), 12);
        assert_eq!(facts.fact(&conn, 1, UserFact::FriendCount).unwrap(), 0);
    }
}
