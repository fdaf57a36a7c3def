//! XP, levels, achievements and badges
//!
//! # Usage
//!
//! ```ignore
//! let db = ProgressionDb::open(&path)?;
//! let coordinator = ProgressionCoordinator::new(db, settings, Arc::new(SqliteFacts))?;
//!
//! // Reward an activity, unlocking whatever it makes reachable
//! let report = coordinator.award_xp(user_id, 50, "article_create", None)?;
//!
//! // Read back
//! let level = coordinator.query().get_user_level(user_id)?;
//! ```

pub mod badges;
pub mod coordinator;
pub mod curve;
pub mod events;
pub mod ledger;
pub mod requirements;

pub use badges::BadgeRule;
pub use coordinator::{BatchSummary, ProgressionCoordinator};
pub use curve::{LevelProgress, ProgressionCurve};
pub use events::{AwardReport, LogSink, NotificationSink, ProgressionEvent};
pub use ledger::{Grant, RewardLedger};
pub use requirements::{Requirement, RequirementEvaluator, RequirementKind};
