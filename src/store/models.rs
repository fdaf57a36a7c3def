//! Data models for progression tracking
//!
//! These structures represent the rows stored in and queried from the progression database.

use serde::{Deserialize, Serialize};

/// Host user identifier
pub type UserId = i64;

/// A user's running totals. `level` is a cache of the curve applied to `total_xp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLevel {
    pub user_id: UserId,
    pub level: u32,
    pub total_xp: i64,
    pub total_points: i64,
    pub total_achievements: i64,
    pub updated_at: i64,
}

/// Level view recomputed from `total_xp` at read time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelView {
    pub user_id: UserId,
    pub level: u32,
    pub total_xp: i64,
    pub total_points: i64,
    pub total_achievements: i64,
    pub current_level_xp: i64,
    pub xp_to_next_level: i64,
    /// 0-100, 100 at max level
    pub progress_percent: f64,
}

/// Achievement catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
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
    /// Free-form JSON, interpreted per requirement kind
    #[serde(default)]
    pub requirement_data: Option<String>,
    #[serde(default)]
    pub xp_reward: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default = "default_rarity")]
    pub rarity: Rarity,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Badge catalog entry. Requirements live in code, keyed by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_rarity")]
    pub rarity: Rarity,
    #[serde(default)]
    pub xp_reward: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_rarity() -> Rarity {
    Rarity::Common
}

fn default_active() -> bool {
    true
}

/// Catalog rarity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }

    pub fn all() -> &'static [Rarity] {
        &[
            Self::Common,
            Self::Uncommon,
            Self::Rare,
            Self::Epic,
            Self::Legendary,
        ]
    }
}

impl std::str::FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "common" => Ok(Self::Common),
            "uncommon" => Ok(Self::Uncommon),
            "rare" => Ok(Self::Rare),
            "epic" => Ok(Self::Epic),
            "legendary" => Ok(Self::Legendary),
            other => Err(format!("unknown rarity: {}", other)),
        }
    }
}

/// A user's state for one achievement, joined with its catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: UserId,
    pub achievement: Achievement,
    pub progress: i64,
    pub is_completed: bool,
    pub completed_at: Option<i64>,
}

/// A badge a user holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBadge {
    pub user_id: UserId,
    pub badge: Badge,
    pub earned_at: i64,
}

/// Append-only audit row for every XP/points grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub user_id: UserId,
    pub activity_type: String,
    pub activity_data: Option<String>,
    pub xp_earned: i64,
    pub points_earned: i64,
    pub created_at: i64,
}

/// Notification type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LevelUp,
    AchievementUnlocked,
    BadgeEarned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LevelUp => "level_up",
            Self::AchievementUnlocked => "achievement_unlocked",
            Self::BadgeEarned => "badge_earned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "level_up" => Some(Self::LevelUp),
            "achievement_unlocked" => Some(Self::AchievementUnlocked),
            "badge_earned" => Some(Self::BadgeEarned),
            _ => None,
        }
    }
}

/// Notification about to be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub achievement_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl NewNotification {
    pub fn level_up(user_id: UserId, level: u32) -> Self {
        Self {
            user_id,
            achievement_id: None,
            kind: NotificationKind::LevelUp,
            title: "Level Up!".to_string(),
            message: format!("Congratulations! You've reached level {}!", level),
        }
    }

    pub fn achievement_unlocked(user_id: UserId, achievement: &Achievement) -> Self {
        Self {
            user_id,
            achievement_id: Some(achievement.id),
            kind: NotificationKind::AchievementUnlocked,
            title: "Achievement Unlocked!".to_string(),
            message: format!("You've earned the '{}' achievement!", achievement.name),
        }
    }

    pub fn badge_earned(user_id: UserId, badge: &Badge) -> Self {
        Self {
            user_id,
            achievement_id: None,
            kind: NotificationKind::BadgeEarned,
            title: "Badge Earned!".to_string(),
            message: format!("You've earned the '{}' badge!", badge.name),
        }
    }
}

/// Stored notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub achievement_id: Option<i64>,
    /// Raw type tag; see [`NotificationKind`]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: UserId,
    pub level: u32,
    pub total_xp: i64,
    pub total_points: i64,
    pub total_achievements: i64,
}

/// Completed/total pair for a stats bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCount {
    pub total: i64,
    pub completed: i64,
}

/// Per-user achievement breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementStats {
    pub overall: CompletionCount,
    /// Keyed by category id; uncategorized achievements use `None`
    pub by_category: Vec<(Option<i64>, CompletionCount)>,
    /// Always lists every rarity, common first
    pub by_rarity: Vec<(Rarity, CompletionCount)>,
}

/// Engine-wide status snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub active_achievements: i64,
    pub active_badges: i64,
    pub ranked_users: i64,
    pub completions: i64,
    pub badges_awarded: i64,
}
