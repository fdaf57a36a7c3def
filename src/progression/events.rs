//! Progression events and notification delivery

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProgressionError, Result};
use crate::store::models::{NewNotification, UserId};

/// Something that happened during a reward operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressionEvent {
    XpAwarded {
        user_id: UserId,
        amount: i64,
        activity_type: String,
    },
    PointsAwarded {
        user_id: UserId,
        amount: i64,
        activity_type: String,
    },
    LevelUp {
        user_id: UserId,
        old_level: u32,
        new_level: u32,
    },
    AchievementUnlocked {
        user_id: UserId,
        achievement_id: i64,
        slug: String,
        name: String,
    },
    BadgeEarned {
        user_id: UserId,
        badge_id: i64,
        slug: String,
        name: String,
    },
}

/// Outcome of a public reward operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardReport {
    /// `false` when the system (or the level system, for XP) is switched off
    pub applied: bool,
    pub events: Vec<ProgressionEvent>,
}

impl AwardReport {
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Turn a skipped report into [`ProgressionError::Disabled`]
    pub fn ensure_applied(self) -> Result<Self> {
        if self.applied {
            Ok(self)
        } else {
            Err(ProgressionError::Disabled)
        }
    }

    /// Total XP granted across the whole cascade
    pub fn xp_granted(&self) -> i64 {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressionEvent::XpAwarded { amount, .. } => Some(*amount),
                _ => None,
            })
            .sum()
    }

    pub fn points_granted(&self) -> i64 {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressionEvent::PointsAwarded { amount, .. } => Some(*amount),
                _ => None,
            })
            .sum()
    }

    /// Slugs of achievements unlocked, in unlock order
    pub fn unlocked(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressionEvent::AchievementUnlocked { slug, .. } => Some(slug.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Slugs of badges earned
    pub fn badges(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressionEvent::BadgeEarned { slug, .. } => Some(slug.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Highest level reached, if the user levelled up
    pub fn new_level(&self) -> Option<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressionEvent::LevelUp { new_level, .. } => Some(*new_level),
                _ => None,
            })
            .max()
    }
}

/// Push channel for notifications.
///
/// Called only after the reward transaction has committed, once per stored
/// notification. Delivery is best effort: the notification row is already
/// persisted by the time the sink sees it.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &NewNotification);
}

/// Default sink: writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &NewNotification) {
        info!(
            user_id = notification.user_id,
            kind = notification.kind.as_str(),
            "{}: {}",
            notification.title,
            notification.message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> AwardReport {
        AwardReport {
            applied: true,
            events: vec![
                ProgressionEvent::XpAwarded {
                    user_id: 1,
                    amount: 40,
                    activity_type: "user_login".into(),
                },
                ProgressionEvent::LevelUp {
                    user_id: 1,
                    old_level: 1,
                    new_level: 2,
                },
                ProgressionEvent::XpAwarded {
                    user_id: 1,
                    amount: 200,
                    activity_type: "achievement_completed".into(),
                },
                ProgressionEvent::LevelUp {
                    user_id: 1,
                    old_level: 2,
                    new_level: 4,
                },
            ],
        }
    }

    #[test]
    fn test_report_totals() {
        let report = report();
        assert_eq!(report.xp_granted(), 240);
        assert_eq!(report.points_granted(), 0);
        assert_eq!(report.new_level(), Some(4));
        assert!(report.unlocked().is_empty());
    }

    #[test]
    fn test_ensure_applied() {
        assert!(report().ensure_applied().is_ok());
        assert!(matches!(
            AwardReport::skipped().ensure_applied(),
            Err(ProgressionError::Disabled)
        ));
    }

    #[test]
    fn test_event_tagged_json() {
        let json = serde_json::to_value(&report().events[1]).unwrap();
        assert_eq!(json["event"], "level_up");
        assert_eq!(json["new_level"], 2);
    }
}
