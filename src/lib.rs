//! Progression engine
//!
//! Turns user activity on a community site into XP and points, derives a
//! level from cumulative XP on a geometric curve, and unlocks achievements
//! and badges exactly once per user.
//!
//! ## Pieces
//!
//! 1. **Curve**: pure XP <-> level conversion.
//!
//! 2. **Requirements and badge rules**: decide whether a user has earned a
//!    catalog achievement (data driven) or a badge (rule per slug).
//!
//! 3. **Coordinator**: applies rewards in a single transaction and follows
//!    the unlock cascade to its end.

pub mod activity;
pub mod config;
pub mod error;
pub mod progression;
pub mod store;

pub use activity::Activity;
pub use config::{Config, ProgressionSettings};
pub use error::{ProgressionError, Result};
pub use progression::{AwardReport, ProgressionCoordinator, ProgressionCurve, ProgressionEvent};
pub use store::{ProgressionDb, SqliteFacts, StaticFacts};
