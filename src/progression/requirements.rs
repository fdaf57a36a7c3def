//! Achievement requirement evaluation
//!
//! Achievements carry a `requirement_type` tag from the catalog. The tag is
//! parsed once into [`RequirementKind`] and evaluated against user facts.
//! Kinds the engine does not know how to measure yet are kept as
//! [`RequirementKind::Unimplemented`] and never satisfied.

use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::facts::{FactProvider, UserFact};
use crate::store::models::{Achievement, UserId};
use crate::store::progress;

/// `count` achievements that every user earns on their first check
pub const AUTO_AWARD_SLUGS: &[&str] = &["first-steps"];

/// `count` achievement earned by uploading a profile photo
pub const PHOTO_PIONEER_SLUG: &str = "photo-pioneer";

/// Parsed requirement tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementKind {
    /// Completed achievements, optionally within one category
    AchievementCount { category_id: Option<i64> },
    DaysSinceJoin,
    PostsCount,
    FriendsCount,
    ProfileComplete,
    StatusCount,
    ArticleCount,
    /// Satisfied by any user the engine is asked about
    FirstLogin,
    /// Generic bucket resolved by the achievement slug
    Count(CountRule),
    Level,
    Points,
    ActivityCount { activity_type: String },
    /// Known or unknown tag with no measurement wired up
    Unimplemented(String),
}

/// Behaviour of a `count` achievement, chosen by slug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountRule {
    AutoAward,
    PhotoPioneer,
    NotAutoAwardable,
}

#[derive(Debug, Default, Deserialize)]
struct RequirementData {
    category_id: Option<i64>,
    activity_type: Option<String>,
}

/// A requirement ready for evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub kind: RequirementKind,
    /// Threshold compared with `>=`
    pub value: i64,
}

impl Requirement {
    pub fn from_achievement(achievement: &Achievement) -> Self {
        let data = match achievement.requirement_data.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str::<RequirementData>(raw).unwrap_or_else(|e| {
                    warn!(slug = %achievement.slug, "Unreadable requirement_data: {}", e);
                    RequirementData::default()
                })
            }
            _ => RequirementData::default(),
        };

        let kind = match achievement.requirement_type.as_str() {
            "achievement_count" => RequirementKind::AchievementCount {
                category_id: data.category_id,
            },
            "days_since_join" => RequirementKind::DaysSinceJoin,
            "posts_count" => RequirementKind::PostsCount,
            "friends_count" => RequirementKind::FriendsCount,
            "profile_complete" => RequirementKind::ProfileComplete,
            "status_count" => RequirementKind::StatusCount,
            "article_count" => RequirementKind::ArticleCount,
            "first_login" => RequirementKind::FirstLogin,
            "count" => RequirementKind::Count(CountRule::for_slug(&achievement.slug)),
            "level" => RequirementKind::Level,
            "points" => RequirementKind::Points,
            "activity_count" => match data.activity_type {
                Some(activity_type) => RequirementKind::ActivityCount { activity_type },
                None => RequirementKind::Unimplemented("activity_count without activity_type".into()),
            },
            // ref_tags, bug_reports, settings_updated and anything newer
            other => RequirementKind::Unimplemented(other.to_string()),
        };

        Self {
            kind,
            value: achievement.requirement_value,
        }
    }
}

impl CountRule {
    pub fn for_slug(slug: &str) -> Self {
        if AUTO_AWARD_SLUGS.contains(&slug) {
            Self::AutoAward
        } else if slug == PHOTO_PIONEER_SLUG {
            Self::PhotoPioneer
        } else {
            Self::NotAutoAwardable
        }
    }
}

/// Result of evaluating one requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub satisfied: bool,
    /// Informational, 0-100
    pub progress: u8,
}

impl Evaluation {
    fn met() -> Self {
        Self {
            satisfied: true,
            progress: 100,
        }
    }

    fn never() -> Self {
        Self {
            satisfied: false,
            progress: 0,
        }
    }

    fn at_least(actual: i64, required: i64) -> Self {
        let satisfied = actual >= required;
        let progress = if satisfied {
            100
        } else if required <= 0 {
            0
        } else {
            (actual.max(0).saturating_mul(100) / required).clamp(0, 99) as u8
        };
        Self { satisfied, progress }
    }
}

/// Reads user facts inside the caller's transaction
pub struct FactReader<'a> {
    conn: &'a Connection,
    user_id: UserId,
    provider: &'a dyn FactProvider,
}

impl<'a> FactReader<'a> {
    pub fn new(conn: &'a Connection, user_id: UserId, provider: &'a dyn FactProvider) -> Self {
        Self {
            conn,
            user_id,
            provider,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Fact from the host application
    pub fn fact(&self, fact: UserFact) -> Result<i64> {
        self.provider.fact(self.conn, self.user_id, fact)
    }

    pub fn completed_achievements(&self, category_id: Option<i64>) -> Result<i64> {
        progress::completed_count(self.conn, self.user_id, category_id)
    }

    pub fn level(&self) -> Result<i64> {
        Ok(progress::user_level(self.conn, self.user_id)?
            .map(|l| l.level as i64)
            .unwrap_or(1))
    }

    pub fn total_points(&self) -> Result<i64> {
        Ok(progress::user_level(self.conn, self.user_id)?
            .map(|l| l.total_points)
            .unwrap_or(0))
    }

    pub fn activity_count(&self, activity_type: &str) -> Result<i64> {
        progress::activity_count(self.conn, self.user_id, activity_type)
    }
}

/// Answers "does this user satisfy this requirement?"
pub struct RequirementEvaluator;

impl RequirementEvaluator {
    pub fn evaluate(reader: &FactReader<'_>, requirement: &Requirement) -> Result<Evaluation> {
        let required = requirement.value;

        let evaluation = match &requirement.kind {
            RequirementKind::AchievementCount { category_id } => {
                Evaluation::at_least(reader.completed_achievements(*category_id)?, required)
            }
            RequirementKind::DaysSinceJoin => {
                Evaluation::at_least(reader.fact(UserFact::DaysSinceJoin)?, required)
            }
            RequirementKind::PostsCount => {
                Evaluation::at_least(reader.fact(UserFact::PostCount)?, required)
            }
            RequirementKind::FriendsCount => {
                Evaluation::at_least(reader.fact(UserFact::FriendCount)?, required)
            }
            RequirementKind::ProfileComplete => {
                Evaluation::at_least(reader.fact(UserFact::ProfileComplete)?, 1)
            }
            RequirementKind::StatusCount => {
                Evaluation::at_least(reader.fact(UserFact::StatusCount)?, required)
            }
            RequirementKind::ArticleCount => {
                Evaluation::at_least(reader.fact(UserFact::ArticleCount)?, required)
            }
            RequirementKind::FirstLogin => Evaluation::met(),
            RequirementKind::Count(CountRule::AutoAward) => Evaluation::met(),
            RequirementKind::Count(CountRule::PhotoPioneer) => {
                Evaluation::at_least(reader.fact(UserFact::PhotoCount)?, required.max(1))
            }
            RequirementKind::Count(CountRule::NotAutoAwardable) => Evaluation::never(),
            RequirementKind::Level => Evaluation::at_least(reader.level()?, required),
            RequirementKind::Points => Evaluation::at_least(reader.total_points()?, required),
            RequirementKind::ActivityCount { activity_type } => {
                Evaluation::at_least(reader.activity_count(activity_type)?, required)
            }
            RequirementKind::Unimplemented(tag) => {
                debug!(tag = %tag, "Requirement kind not wired, never satisfied");
                Evaluation::never()
            }
        };

        Ok(evaluation)
    }

    /// Convenience wrapper for a catalog entry
    pub fn evaluate_achievement(
        reader: &FactReader<'_>,
        achievement: &Achievement,
    ) -> Result<Evaluation> {
        let requirement = Requirement::from_achievement(achievement);
        let evaluation = Self::evaluate(reader, &requirement)?;
        debug!(
            user_id = reader.user_id(),
            slug = %achievement.slug,
            satisfied = evaluation.satisfied,
            progress = evaluation.progress,
            "Evaluated achievement"
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProgressionDb;
    use crate::store::facts::StaticFacts;
    use crate::store::models::Rarity;

    fn achievement(slug: &str, requirement_type: &str, value: i64) -> Achievement {
        Achievement {
            id: 1,
            slug: slug.to_string(),
            name: slug.to_string(),
            description: String::new(),
            category_id: None,
            type_id: None,
            requirement_type: requirement_type.to_string(),
            requirement_value: value,
            requirement_data: None,
            xp_reward: 0,
            points: 0,
            rarity: Rarity::Common,
            sort_order: 0,
            is_active: true,
        }
    }

    fn check(facts: &StaticFacts, achievement: &Achievement) -> Evaluation {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let reader = FactReader::new(&conn, 1, facts);
        RequirementEvaluator::evaluate_achievement(&reader, achievement).unwrap()
    }

    #[test]
    fn test_parse_kinds() {
        let parse = |t: &str| Requirement::from_achievement(&achievement("x", t, 1)).kind;
        assert_eq!(parse("friends_count"), RequirementKind::FriendsCount);
        assert_eq!(
            parse("achievement_count"),
            RequirementKind::AchievementCount { category_id: None }
        );
        assert_eq!(
            parse("ref_tags"),
            RequirementKind::Unimplemented("ref_tags".into())
        );
        assert!(matches!(
            parse("activity_count"),
            RequirementKind::Unimplemented(_)
        ));
    }

    #[test]
    fn test_requirement_data_is_parsed() {
        let mut a = achievement("collector", "achievement_count", 3);
        a.requirement_data = Some(r#"{"category_id": 4}"#.into());
        assert_eq!(
            Requirement::from_achievement(&a).kind,
            RequirementKind::AchievementCount {
                category_id: Some(4)
            }
        );

        let mut a = achievement("explorer", "activity_count", 3);
        a.requirement_data = Some(r#"{"activity_type": "wiki_visit"}"#.into());
        assert_eq!(
            Requirement::from_achievement(&a).kind,
            RequirementKind::ActivityCount {
                activity_type: "wiki_visit".into()
            }
        );
    }

    #[test]
    fn test_threshold_kinds_use_at_least() {
        let facts = StaticFacts::new()
            .with(1, UserFact::FriendCount, 5)
            .with(1, UserFact::PostCount, 3);

        assert!(check(&facts, &achievement("pals", "friends_count", 5)).satisfied);
        assert!(!check(&facts, &achievement("crowd", "friends_count", 6)).satisfied);

        let partial = check(&facts, &achievement("ambassador", "posts_count", 20));
        assert!(!partial.satisfied);
        assert_eq!(partial.progress, 15);
    }

    #[test]
    fn test_count_bucket_uses_slug_allow_list() {
        let facts = StaticFacts::new();
        assert!(check(&facts, &achievement("first-steps", "count", 0)).satisfied);
        assert!(!check(&facts, &achievement("mystery", "count", 0)).satisfied);
        assert!(!check(&facts, &achievement("photo-pioneer", "count", 0)).satisfied);

        let facts = StaticFacts::new().with(1, UserFact::PhotoCount, 1);
        assert!(check(&facts, &achievement("photo-pioneer", "count", 0)).satisfied);
    }

    #[test]
    fn test_unimplemented_kinds_never_satisfied() {
        let facts = StaticFacts::new();
        for tag in ["ref_tags", "bug_reports", "settings_updated", "brand_new_kind"] {
            assert!(!check(&facts, &achievement("x", tag, 0)).satisfied, "{}", tag);
        }
    }

    #[test]
    fn test_first_login_and_profile() {
        let facts = StaticFacts::new();
        assert!(check(&facts, &achievement("welcome", "first_login", 0)).satisfied);
        assert!(!check(&facts, &achievement("profile", "profile_complete", 0)).satisfied);

        let facts = StaticFacts::new().with(1, UserFact::ProfileComplete, 1);
        assert!(check(&facts, &achievement("profile", "profile_complete", 0)).satisfied);
    }

    #[test]
    fn test_engine_owned_facts() {
        let db = ProgressionDb::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        progress::add_totals(&conn, 1, 0, 250).unwrap();
        progress::set_level(&conn, 1, 4).unwrap();

        let facts = StaticFacts::new();
        let reader = FactReader::new(&conn, 1, &facts);
        let level = Requirement::from_achievement(&achievement("lvl", "level", 4));
        let points = Requirement::from_achievement(&achievement("pts", "points", 300));

        assert!(RequirementEvaluator::evaluate(&reader, &level).unwrap().satisfied);
        assert!(!RequirementEvaluator::evaluate(&reader, &points).unwrap().satisfied);
    }
}
