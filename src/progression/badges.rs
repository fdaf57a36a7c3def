//! Badge rules
//!
//! Unlike achievements, badges have no catalog-driven requirement. Each badge
//! slug maps to a fixed rule here; catalog rows whose slug has no rule are
//! never awarded.

use crate::error::Result;
use crate::progression::requirements::FactReader;
use crate::store::facts::UserFact;

/// Closed set of badge rules, keyed by badge slug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeRule {
    /// 5+ friends and 10+ public posts
    SocialButterfly,
    /// 10+ completed achievements
    AchievementHunter,
    /// 5+ shared articles
    Wordsmith,
    /// Member for a year
    LoyalMember,
    /// Level 10 or above
    RisingStar,
    /// Complete profile, a friend and a post
    WellRounded,
}

impl BadgeRule {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::SocialButterfly => "social-butterfly",
            Self::AchievementHunter => "achievement-hunter",
            Self::Wordsmith => "wordsmith",
            Self::LoyalMember => "loyal-member",
            Self::RisingStar => "rising-star",
            Self::WellRounded => "well-rounded",
        }
    }

    pub fn for_slug(slug: &str) -> Option<Self> {
        Self::all().iter().copied().find(|rule| rule.slug() == slug)
    }

    pub fn all() -> &'static [BadgeRule] {
        &[
            Self::SocialButterfly,
            Self::AchievementHunter,
            Self::Wordsmith,
            Self::LoyalMember,
            Self::RisingStar,
            Self::WellRounded,
        ]
    }

    pub fn is_satisfied(&self, reader: &FactReader<'_>) -> Result<bool> {
        let satisfied = match self {
            Self::SocialButterfly => {
                reader.fact(UserFact::FriendCount)? >= 5 && reader.fact(UserFact::PostCount)? >= 10
            }
            Self::AchievementHunter => reader.completed_achievements(None)? >= 10,
            Self::Wordsmith => reader.fact(UserFact::ArticleCount)? >= 5,
            Self::LoyalMember => reader.fact(UserFact::DaysSinceJoin)? >= 365,
            Self::RisingStar => reader.level()? >= 10,
            Self::WellRounded => {
                reader.fact(UserFact::ProfileComplete)? >= 1
                    && reader.fact(UserFact::FriendCount)? >= 1
                    && reader.fact(UserFact::PostCount)? >= 1
            }
        };
        Ok(satisfied)
    }
}
