//! Achievement and badge catalogs
//!
//! The engine only reads the catalogs while awarding. The upsert and import
//! helpers exist for admin tooling and fixtures.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProgressionError, Result};
use crate::store::models::{Achievement, Badge, Rarity};

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid"));

pub(crate) const ACHIEVEMENT_COLUMNS: &str = "a.id, a.slug, a.name, a.description, a.category_id, \
     a.type_id, a.requirement_type, a.requirement_value, a.requirement_data, a.xp_reward, \
     a.points, a.rarity, a.sort_order, a.is_active";

pub(crate) const BADGE_COLUMNS: &str =
    "b.id, b.slug, b.name, b.description, b.rarity, b.xp_reward, b.points, b.sort_order, b.is_active";

/// Map a row selected with [`ACHIEVEMENT_COLUMNS`] starting at `offset`
pub(crate) fn achievement_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Achievement> {
    Ok(Achievement {
        id: row.get(offset)?,
        slug: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        description: row.get(offset + 3)?,
        category_id: row.get(offset + 4)?,
        type_id: row.get(offset + 5)?,
        requirement_type: row.get(offset + 6)?,
        requirement_value: row.get(offset + 7)?,
        requirement_data: row.get(offset + 8)?,
        xp_reward: row.get(offset + 9)?,
        points: row.get(offset + 10)?,
        rarity: parse_rarity(row.get::<_, String>(offset + 11)?),
        sort_order: row.get(offset + 12)?,
        is_active: row.get(offset + 13)?,
    })
}

/// Map a row selected with [`BADGE_COLUMNS`] starting at `offset`
pub(crate) fn badge_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Badge> {
    Ok(Badge {
        id: row.get(offset)?,
        slug: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        description: row.get(offset + 3)?,
        rarity: parse_rarity(row.get::<_, String>(offset + 4)?),
        xp_reward: row.get(offset + 5)?,
        points: row.get(offset + 6)?,
        sort_order: row.get(offset + 7)?,
        is_active: row.get(offset + 8)?,
    })
}

fn parse_rarity(raw: String) -> Rarity {
    raw.parse().unwrap_or(Rarity::Common)
}

/// Active achievements in display order
pub fn active_achievements(conn: &Connection) -> Result<Vec<Achievement>> {
    let sql = format!(
        "SELECT {} FROM achievements a WHERE a.is_active = 1 ORDER BY a.sort_order, a.id",
        ACHIEVEMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| achievement_from_row(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Number of active achievements
pub fn active_achievement_count(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM achievements WHERE is_active = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(count as usize)
}

pub fn achievement_by_slug(conn: &Connection, slug: &str) -> Result<Option<Achievement>> {
    let sql = format!("SELECT {} FROM achievements a WHERE a.slug = ?1", ACHIEVEMENT_COLUMNS);
    let achievement = conn
        .query_row(&sql, params![slug], |row| achievement_from_row(row, 0))
        .optional()?;
    Ok(achievement)
}

pub fn achievement_by_id(conn: &Connection, id: i64) -> Result<Option<Achievement>> {
    let sql = format!("SELECT {} FROM achievements a WHERE a.id = ?1", ACHIEVEMENT_COLUMNS);
    let achievement = conn
        .query_row(&sql, params![id], |row| achievement_from_row(row, 0))
        .optional()?;
    Ok(achievement)
}

/// Active badges in display order
pub fn active_badges(conn: &Connection) -> Result<Vec<Badge>> {
    let sql = format!(
        "SELECT {} FROM badges b WHERE b.is_active = 1 ORDER BY b.sort_order, b.id",
        BADGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| badge_from_row(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Closest known achievement slug, for "did you mean" hints
pub fn suggest_achievement_slug(conn: &Connection, unknown: &str) -> Result<Option<String>> {
    use strsim::jaro_winkler;

    const FUZZY_THRESHOLD: f64 = 0.8;

    let mut stmt = conn.prepare("SELECT slug FROM achievements")?;
    let slugs = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let best = slugs
        .into_iter()
        .map(|slug| (jaro_winkler(unknown, &slug), slug))
        .filter(|(score, _)| *score >= FUZZY_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, slug)| slug);
    Ok(best)
}

// ========================================
// ADMIN OPERATIONS
// ========================================

/// Achievement definition as written in a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDef {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub type_id: Option<i64>,
    pub requirement_type: String,
    #[serde(default)]
    pub requirement_value: i64,
    /// Inline TOML table, stored as JSON
    #[serde(default)]
    pub requirement_data: Option<serde_json::Value>,
    #[serde(default)]
    pub xp_reward: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub rarity: Option<Rarity>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Badge definition as written in a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDef {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rarity: Option<Rarity>,
    #[serde(default)]
    pub xp_reward: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A catalog file: `[[achievement]]` and `[[badge]]` arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub achievement: Vec<AchievementDef>,
    #[serde(default)]
    pub badge: Vec<BadgeDef>,
}

impl CatalogFile {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ProgressionError::Validation(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

fn validate_slug(slug: &str) -> Result<()> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(ProgressionError::Validation(format!("invalid slug: {:?}", slug)))
    }
}

fn validate_rewards(slug: &str, xp: i64, points: i64) -> Result<()> {
    if xp < 0 || points < 0 {
        return Err(ProgressionError::Validation(format!(
            "rewards for {} must not be negative",
            slug
        )));
    }
    Ok(())
}

/// Insert or update an achievement by slug, returning its id
pub fn upsert_achievement(conn: &Connection, def: &AchievementDef) -> Result<i64> {
    validate_slug(&def.slug)?;
    validate_rewards(&def.slug, def.xp_reward, def.points)?;
    if def.name.trim().is_empty() {
        return Err(ProgressionError::Validation(format!(
            "achievement {} has no name",
            def.slug
        )));
    }

    let data = def.requirement_data.as_ref().map(|v| v.to_string());
    let rarity = def.rarity.unwrap_or(Rarity::Common);

    let id = conn.query_row(
        r#"INSERT INTO achievements (slug, name, description, category_id, type_id,
               requirement_type, requirement_value, requirement_data, xp_reward, points,
               rarity, sort_order, is_active)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           ON CONFLICT(slug) DO UPDATE SET
               name = excluded.name,
               description = excluded.description,
               category_id = excluded.category_id,
               type_id = excluded.type_id,
               requirement_type = excluded.requirement_type,
               requirement_value = excluded.requirement_value,
               requirement_data = excluded.requirement_data,
               xp_reward = excluded.xp_reward,
               points = excluded.points,
               rarity = excluded.rarity,
               sort_order = excluded.sort_order,
               is_active = excluded.is_active
           RETURNING id"#,
        params![
            def.slug,
            def.name,
            def.description,
            def.category_id,
            def.type_id,
            def.requirement_type,
            def.requirement_value,
            data,
            def.xp_reward,
            def.points,
            rarity.as_str(),
            def.sort_order,
            def.is_active,
        ],
        |r| r.get(0),
    )?;
    Ok(id)
}

/// Insert or update a badge by slug, returning its id
pub fn upsert_badge(conn: &Connection, def: &BadgeDef) -> Result<i64> {
    validate_slug(&def.slug)?;
    validate_rewards(&def.slug, def.xp_reward, def.points)?;

    let rarity = def.rarity.unwrap_or(Rarity::Common);

    let id = conn.query_row(
        r#"INSERT INTO badges (slug, name, description, rarity, xp_reward, points, sort_order, is_active)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(slug) DO UPDATE SET
               name = excluded.name,
               description = excluded.description,
               rarity = excluded.rarity,
               xp_reward = excluded.xp_reward,
               points = excluded.points,
               sort_order = excluded.sort_order,
               is_active = excluded.is_active
           RETURNING id"#,
        params![
            def.slug,
            def.name,
            def.description,
            rarity.as_str(),
            def.xp_reward,
            def.points,
            def.sort_order,
            def.is_active,
        ],
        |r| r.get(0),
    )?;
    Ok(id)
}

/// Counts written by [`import_catalog`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub achievements: usize,
    pub badges: usize,
}

/// Upsert every entry of a catalog file. Validation runs before any write.
pub fn import_catalog(conn: &Connection, catalog: &CatalogFile) -> Result<ImportSummary> {
    for def in &catalog.achievement {
        validate_slug(&def.slug)?;
    }
    for def in &catalog.badge {
        validate_slug(&def.slug)?;
    }

    let mut summary = ImportSummary::default();
    for def in &catalog.achievement {
        upsert_achievement(conn, def)?;
        summary.achievements += 1;
    }
    for def in &catalog.badge {
        upsert_badge(conn, def)?;
        summary.badges += 1;
    }

    info!(
        achievements = summary.achievements,
        badges = summary.badges,
        "Imported catalog"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProgressionDb;

    const CATALOG: &str = r#"
[[achievement]]
slug = "first-steps"
name = "First Steps"
requirement_type = "count"
xp_reward = 10
points = 5

[[achievement]]
slug = "explorer"
name = "Explorer"
requirement_type = "activity_count"
requirement_value = 3
requirement_data = { activity_type = "wiki_visit" }
rarity = "rare"

[[badge]]
slug = "social-butterfly"
name = "Social Butterfly"
xp_reward = 100
"#;

    #[test]
    fn test_import_and_read_back() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();

        let catalog = CatalogFile::from_toml(CATALOG).unwrap();
        let summary = import_catalog(&conn, &catalog).unwrap();
        assert_eq!(summary, ImportSummary { achievements: 2, badges: 1 });

        let explorer = achievement_by_slug(&conn, "explorer").unwrap().unwrap();
        assert_eq!(explorer.rarity, Rarity::Rare);
        assert_eq!(
            explorer.requirement_data.as_deref(),
            Some(r#"{"activity_type":"wiki_visit"}"#)
        );
        assert_eq!(active_achievement_count(&conn).unwrap(), 2);
        assert_eq!(active_badges(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_keeps_id() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let catalog = CatalogFile::from_toml(CATALOG).unwrap();

        let first = upsert_achievement(&conn, &catalog.achievement[0]).unwrap();
        let mut changed = catalog.achievement[0].clone();
        changed.xp_reward = 99;
        let second = upsert_achievement(&conn, &changed).unwrap();

        assert_eq!(first, second);
        let stored = achievement_by_id(&conn, first).unwrap().unwrap();
        assert_eq!(stored.xp_reward, 99);
    }

    #[test]
    fn test_invalid_slug_rejected_before_writes() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let mut catalog = CatalogFile::from_toml(CATALOG).unwrap();
        catalog.badge[0].slug = "Social Butterfly".to_string();

        let err = import_catalog(&conn, &catalog).unwrap_err();
        assert!(matches!(err, ProgressionError::Validation(_)));
        assert_eq!(active_achievement_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_suggest_slug() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        import_catalog(&conn, &CatalogFile::from_toml(CATALOG).unwrap()).unwrap();

        assert_eq!(
            suggest_achievement_slug(&conn, "first-step").unwrap().as_deref(),
            Some("first-steps")
        );
        assert_eq!(suggest_achievement_slug(&conn, "zzz").unwrap(), None);
    }
}
