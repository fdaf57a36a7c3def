//! Shared test utilities for progression integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use progression_engine::config::ProgressionSettings;
use progression_engine::progression::NotificationSink;
use progression_engine::store::catalog::{self, AchievementDef, BadgeDef};
use progression_engine::store::models::NewNotification;
use progression_engine::store::{FactProvider, ProgressionDb, StaticFacts};
use progression_engine::ProgressionCoordinator;
use tempfile::TempDir;

/// Sink that keeps every delivered notification
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<NewNotification>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<NewNotification> {
        self.delivered.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &NewNotification) {
        self.delivered.lock().unwrap().push(notification.clone());
    }
}

/// Enabled settings on a small curve: 100, 120, 144, 172, 206 ...
pub fn test_settings() -> ProgressionSettings {
    ProgressionSettings {
        xp_per_level: 100,
        level_scaling: 1.2,
        ..ProgressionSettings::enabled()
    }
}

pub fn achievement(
    slug: &str,
    requirement_type: &str,
    requirement_value: i64,
    xp_reward: i64,
    points: i64,
) -> AchievementDef {
    AchievementDef {
        slug: slug.to_string(),
        name: slug.replace('-', " "),
        description: String::new(),
        category_id: None,
        type_id: None,
        requirement_type: requirement_type.to_string(),
        requirement_value,
        requirement_data: None,
        xp_reward,
        points,
        rarity: None,
        sort_order: 0,
        is_active: true,
    }
}

pub fn badge(slug: &str, xp_reward: i64, points: i64) -> BadgeDef {
    BadgeDef {
        slug: slug.to_string(),
        name: slug.replace('-', " "),
        description: String::new(),
        rarity: None,
        xp_reward,
        points,
        sort_order: 0,
        is_active: true,
    }
}

/// Insert achievements and return their ids in order
pub fn seed_achievements(db: &ProgressionDb, defs: &[AchievementDef]) -> Vec<i64> {
    let conn = db.conn().unwrap();
    defs.iter()
        .map(|def| catalog::upsert_achievement(&conn, def).unwrap())
        .collect()
}

pub fn seed_badges(db: &ProgressionDb, defs: &[BadgeDef]) -> Vec<i64> {
    let conn = db.conn().unwrap();
    defs.iter()
        .map(|def| catalog::upsert_badge(&conn, def).unwrap())
        .collect()
}

/// Coordinator wired to a recording sink
pub fn coordinator_with(
    db: &ProgressionDb,
    settings: ProgressionSettings,
    facts: Arc<dyn FactProvider>,
) -> (ProgressionCoordinator, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let coordinator = ProgressionCoordinator::new(db.clone(), settings, facts)
        .unwrap()
        .with_sink(sink.clone());
    (coordinator, sink)
}

pub fn coordinator(db: &ProgressionDb) -> (ProgressionCoordinator, Arc<RecordingSink>) {
    coordinator_with(db, test_settings(), Arc::new(StaticFacts::new()))
}

/// Database file in a fresh temp dir (keep the TempDir alive)
pub fn temp_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("progression.db");
    ProgressionDb::open(&path).expect("Failed to create database");
    (dir, path)
}

pub fn count(db: &ProgressionDb, sql: &str) -> i64 {
    db.conn().unwrap().query_row(sql, [], |r| r.get(0)).unwrap()
}
