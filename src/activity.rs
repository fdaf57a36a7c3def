//! Standard rewards for host activities
//!
//! Hosts call [`ProgressionCoordinator::record_activity`](crate::ProgressionCoordinator::record_activity)
//! with one of these instead of hard-coding amounts at every call site.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Base reward before multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityReward {
    pub xp: i64,
    pub points: i64,
}

const fn reward(xp: i64, points: i64) -> ActivityReward {
    ActivityReward { xp, points }
}

/// Activities the host reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    ArticleCreate,
    ArticleEdit,
    WikiCreate,
    WikiEdit,
    WikiVisit,
    UserRegistered,
    UserLogin,
    FriendAdd,
    CommentWrite,
    LikeGiven,
    LikeReceived,
    DailyActive,
    ContentRating,
    DiscussionStart,
    HelpOther,
    MentionReceived,
    WikiModerate,
    WikiExpert,
}

impl Activity {
    pub const fn reward(&self) -> ActivityReward {
        match self {
            Self::ArticleCreate => reward(50, 10),
            Self::ArticleEdit => reward(25, 5),
            Self::WikiCreate => reward(30, 8),
            Self::WikiEdit => reward(15, 3),
            Self::WikiVisit => reward(2, 0),
            Self::UserRegistered => reward(100, 20),
            Self::UserLogin => reward(5, 0),
            Self::FriendAdd => reward(20, 5),
            Self::CommentWrite => reward(10, 2),
            Self::LikeGiven => reward(1, 0),
            Self::LikeReceived => reward(2, 1),
            Self::DailyActive => reward(10, 0),
            Self::ContentRating => reward(5, 1),
            Self::DiscussionStart => reward(15, 3),
            Self::HelpOther => reward(25, 5),
            Self::MentionReceived => reward(10, 2),
            Self::WikiModerate => reward(20, 4),
            Self::WikiExpert => reward(50, 10),
        }
    }

    /// Tag written to the activity log
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ArticleCreate => "article_create",
            Self::ArticleEdit => "article_edit",
            Self::WikiCreate => "wiki_create",
            Self::WikiEdit => "wiki_edit",
            Self::WikiVisit => "wiki_visit",
            Self::UserRegistered => "user_registered",
            Self::UserLogin => "user_login",
            Self::FriendAdd => "friend_add",
            Self::CommentWrite => "comment_write",
            Self::LikeGiven => "like_given",
            Self::LikeReceived => "like_received",
            Self::DailyActive => "daily_active",
            Self::ContentRating => "content_rating",
            Self::DiscussionStart => "discussion_start",
            Self::HelpOther => "help_other",
            Self::MentionReceived => "mention_received",
            Self::WikiModerate => "wiki_moderate",
            Self::WikiExpert => "wiki_expert",
        }
    }

    pub fn all() -> &'static [Activity] {
        &[
            Self::ArticleCreate,
            Self::ArticleEdit,
            Self::WikiCreate,
            Self::WikiEdit,
            Self::WikiVisit,
            Self::UserRegistered,
            Self::UserLogin,
            Self::FriendAdd,
            Self::CommentWrite,
            Self::LikeGiven,
            Self::LikeReceived,
            Self::DailyActive,
            Self::ContentRating,
            Self::DiscussionStart,
            Self::HelpOther,
            Self::MentionReceived,
            Self::WikiModerate,
            Self::WikiExpert,
        ]
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| format!("unknown activity: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for activity in Activity::all() {
            assert_eq!(activity.as_str().parse::<Activity>(), Ok(*activity));
        }
        assert_eq!("Wiki-Edit".parse::<Activity>(), Ok(Activity::WikiEdit));
        assert!("teleport".parse::<Activity>().is_err());
    }

    #[test]
    fn test_reward_table() {
        assert_eq!(Activity::ArticleCreate.reward(), ActivityReward { xp: 50, points: 10 });
        assert_eq!(Activity::UserLogin.reward(), ActivityReward { xp: 5, points: 0 });
        assert!(Activity::all().iter().all(|a| a.reward().xp > 0));
    }
}
