//! Progression coordinator
//!
//! Applies rewards, keeps the stored level in line with the curve, unlocks
//! achievements and badges, and records notifications. Every public operation
//! runs in one database transaction.
//!
//! A reward can unlock achievements whose own rewards unlock further
//! achievements. Instead of recursing, the coordinator drains a work queue:
//!
//! ```text
//!   reward ──▶ ledger + totals + level ──▶ scan catalog ──▶ complete (gated)
//!     ▲                                                        │
//!     └──────────────── achievement xp / points ◀──────────────┘
//! ```
//!
//! Each achievement completes at most once per user, so the queue empties
//! after a bounded number of steps. A hard step cap turns any violation of
//! that bound into [`ProgressionError::CascadeLimitExceeded`] and a rollback.

use std::collections::VecDeque;
use std::sync::Arc;

use rusqlite::Connection;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::activity::Activity;
use crate::config::ProgressionSettings;
use crate::error::{ProgressionError, Result};
use crate::progression::badges::BadgeRule;
use crate::progression::curve::ProgressionCurve;
use crate::progression::events::{AwardReport, LogSink, NotificationSink, ProgressionEvent};
use crate::progression::ledger::{Grant, RewardLedger};
use crate::progression::requirements::{FactReader, RequirementEvaluator};
use crate::store::facts::FactProvider;
use crate::store::models::{Achievement, NewNotification, UserId};
use crate::store::{ProgressQuery, ProgressionDb, catalog, progress};

/// Extra steps allowed on top of the catalog-derived bound
const CASCADE_SLACK: usize = 8;

/// Activity type logged for achievement rewards
pub const ACHIEVEMENT_ACTIVITY: &str = "achievement_completed";

/// Step cap for a catalog of `catalog_size` active achievements.
///
/// Every achievement completes at most once and enqueues at most two rewards.
pub fn cascade_limit(catalog_size: usize) -> usize {
    catalog_size * 3 + CASCADE_SLACK
}

/// Main entry point for awarding progression
pub struct ProgressionCoordinator {
    db: ProgressionDb,
    settings: ProgressionSettings,
    curve: ProgressionCurve,
    ledger: RewardLedger,
    facts: Arc<dyn FactProvider>,
    sink: Arc<dyn NotificationSink>,
}

/// Result of a batch check over many users
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub users_checked: usize,
    pub achievements_unlocked: usize,
    pub badges_awarded: usize,
    pub failures: Vec<(UserId, String)>,
}

impl ProgressionCoordinator {
    /// Create a coordinator. Settings are validated and frozen here.
    pub fn new(
        db: ProgressionDb,
        settings: ProgressionSettings,
        facts: Arc<dyn FactProvider>,
    ) -> Result<Self> {
        settings.validate()?;
        let curve = ProgressionCurve::from_settings(&settings)?;
        let ledger = RewardLedger::new(&settings);

        Ok(Self {
            db,
            settings,
            curve,
            ledger,
            facts,
            sink: Arc::new(LogSink),
        })
    }

    /// Replace the notification sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &ProgressionSettings {
        &self.settings
    }

    pub fn curve(&self) -> &ProgressionCurve {
        &self.curve
    }

    pub fn db(&self) -> &ProgressionDb {
        &self.db
    }

    /// Read accessors using this coordinator's curve
    pub fn query(&self) -> ProgressQuery {
        ProgressQuery::new(self.db.clone(), self.curve)
    }

    // ========================================
    // REWARD OPERATIONS
    // ========================================

    /// Award XP for an activity. Skipped when the system or the level system is off.
    pub fn award_xp(
        &self,
        user_id: UserId,
        amount: i64,
        activity_type: &str,
        data: Option<Value>,
    ) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.ledger.xp_enabled() {
            debug!(user_id, activity_type, "XP award skipped, level system disabled");
            return Ok(AwardReport::skipped());
        }

        let reward = Reward::new(Amount::Xp(amount), activity_type, data);
        self.run(user_id, |cascade| {
            cascade.queue.push_back(reward);
            Ok(())
        })
    }

    /// Award points for an activity. Never changes the level.
    pub fn award_points(
        &self,
        user_id: UserId,
        amount: i64,
        activity_type: &str,
        data: Option<Value>,
    ) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.ledger.points_enabled() {
            debug!(user_id, activity_type, "Points award skipped, system disabled");
            return Ok(AwardReport::skipped());
        }

        let reward = Reward::new(Amount::Points(amount), activity_type, data);
        self.run(user_id, |cascade| {
            cascade.queue.push_back(reward);
            Ok(())
        })
    }

    /// Award the standard XP and points for a host activity in one log entry
    pub fn record_activity(
        &self,
        user_id: UserId,
        activity: Activity,
        data: Option<Value>,
    ) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.settings.enabled {
            return Ok(AwardReport::skipped());
        }

        let reward = activity.reward();
        let reward = Reward::new(
            Amount::Both {
                xp: reward.xp,
                points: reward.points,
            },
            activity.as_str(),
            data,
        );
        self.run(user_id, |cascade| {
            cascade.queue.push_back(reward);
            Ok(())
        })
    }

    // ========================================
    // ACHIEVEMENT OPERATIONS
    // ========================================

    /// Evaluate every achievement the user has not completed yet
    pub fn check_achievements(&self, user_id: UserId) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.settings.enabled {
            return Ok(AwardReport::skipped());
        }
        self.run(user_id, |cascade| cascade.scan())
    }

    /// Mark an achievement completed and pay out its rewards.
    ///
    /// Does not evaluate requirements. Fails with `AlreadyCompleted` when
    /// another call got there first.
    pub fn complete_achievement(&self, user_id: UserId, achievement_id: i64) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.settings.enabled {
            return Ok(AwardReport::skipped());
        }

        self.run(user_id, |cascade| {
            let achievement = catalog::achievement_by_id(cascade.conn, achievement_id)?
                .ok_or_else(|| ProgressionError::NotFound(format!("achievement #{}", achievement_id)))?;

            if !cascade.complete(&achievement)? {
                return Err(ProgressionError::AlreadyCompleted(achievement.slug));
            }
            cascade.scan()
        })
    }

    /// Manually grant an achievement by slug, after checking its requirements
    pub fn award_achievement_by_slug(&self, user_id: UserId, slug: &str) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.settings.enabled {
            return Ok(AwardReport::skipped());
        }

        self.run(user_id, |cascade| {
            let achievement = match catalog::achievement_by_slug(cascade.conn, slug)? {
                Some(a) if a.is_active => a,
                _ => {
                    let hint = catalog::suggest_achievement_slug(cascade.conn, slug)?
                        .filter(|s| s != slug)
                        .map(|s| format!(" (did you mean '{}'?)", s))
                        .unwrap_or_default();
                    return Err(ProgressionError::NotFound(format!(
                        "achievement '{}'{}",
                        slug, hint
                    )));
                }
            };

            if progress::is_completed(cascade.conn, user_id, achievement.id)? {
                return Err(ProgressionError::AlreadyCompleted(achievement.slug));
            }

            let reader = FactReader::new(cascade.conn, user_id, cascade.facts);
            if !RequirementEvaluator::evaluate_achievement(&reader, &achievement)?.satisfied {
                return Err(ProgressionError::RequirementsNotMet(achievement.slug));
            }

            if !cascade.complete(&achievement)? {
                return Err(ProgressionError::AlreadyCompleted(achievement.slug));
            }
            cascade.scan()
        })
    }

    // ========================================
    // BADGE OPERATIONS
    // ========================================

    /// Award every active badge whose rule the user now satisfies.
    ///
    /// Badge rewards go straight onto the running totals: no multiplier, no
    /// activity log entry, no level-up notification and no achievement re-check.
    /// The stored level is still recomputed from the new total.
    pub fn check_and_award_badges(&self, user_id: UserId) -> Result<AwardReport> {
        validate_user(user_id)?;
        if !self.settings.enabled {
            return Ok(AwardReport::skipped());
        }

        let (report, notifications) = self.db.with_transaction(|tx| {
            let conn: &Connection = tx;
            let owned = progress::owned_badge_ids(conn, user_id)?;
            let reader = FactReader::new(conn, user_id, self.facts.as_ref());
            let mut report = AwardReport {
                applied: true,
                events: Vec::new(),
            };
            let mut notifications = Vec::new();

            for badge in catalog::active_badges(conn)? {
                if owned.contains(&badge.id) {
                    continue;
                }
                let Some(rule) = BadgeRule::for_slug(&badge.slug) else {
                    debug!(slug = %badge.slug, "Badge has no rule, skipping");
                    continue;
                };
                if !rule.is_satisfied(&reader)? {
                    continue;
                }
                if !progress::insert_badge_if_absent(conn, user_id, badge.id)? {
                    continue;
                }

                if badge.xp_reward > 0 || badge.points > 0 {
                    let totals = progress::add_totals(conn, user_id, badge.xp_reward, badge.points)?;
                    let level = self.curve.level_for_xp(totals.total_xp);
                    if level != totals.previous_level {
                        progress::set_level(conn, user_id, level)?;
                    }
                }

                info!(user_id, slug = %badge.slug, "Badge earned");
                report.events.push(ProgressionEvent::BadgeEarned {
                    user_id,
                    badge_id: badge.id,
                    slug: badge.slug.clone(),
                    name: badge.name.clone(),
                });

                if self.settings.notifications_enabled {
                    let notification = NewNotification::badge_earned(user_id, &badge);
                    progress::insert_notification(conn, &notification)?;
                    notifications.push(notification);
                }
            }

            Ok((report, notifications))
        })?;

        self.deliver(&notifications);
        Ok(report)
    }

    /// Check achievements and then badges for each user.
    ///
    /// A failure for one user is recorded and the batch carries on.
    pub fn check_all(&self, user_ids: &[UserId]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for &user_id in user_ids {
            summary.users_checked += 1;
            let result = self
                .check_achievements(user_id)
                .and_then(|a| Ok((a, self.check_and_award_badges(user_id)?)));

            match result {
                Ok((achievements, badges)) => {
                    summary.achievements_unlocked += achievements.unlocked().len();
                    summary.badges_awarded += badges.badges().len();
                }
                Err(e) => {
                    warn!(user_id, "Progression check failed: {}", e);
                    summary.failures.push((user_id, e.to_string()));
                }
            }
        }

        info!(
            users = summary.users_checked,
            achievements = summary.achievements_unlocked,
            badges = summary.badges_awarded,
            failures = summary.failures.len(),
            "Batch check finished"
        );
        summary
    }

    // ========================================
    // INTERNALS
    // ========================================

    /// Seed a cascade, drain it inside one transaction, then push notifications
    fn run<F>(&self, user_id: UserId, seed: F) -> Result<AwardReport>
    where
        F: FnOnce(&mut Cascade<'_>) -> Result<()>,
    {
        let (report, notifications) = self.db.with_transaction(|tx| {
            let conn: &Connection = tx;
            let achievements = catalog::active_achievements(conn)?;
            let mut cascade = Cascade {
                conn,
                user_id,
                settings: &self.settings,
                curve: &self.curve,
                ledger: &self.ledger,
                facts: self.facts.as_ref(),
                catalog: &achievements,
                queue: VecDeque::new(),
                events: Vec::new(),
                notifications: Vec::new(),
                steps: 0,
                limit: cascade_limit(achievements.len()),
            };

            seed(&mut cascade)?;
            cascade.drain()?;
            Ok(cascade.finish())
        })?;

        self.deliver(&notifications);
        Ok(report)
    }

    fn deliver(&self, notifications: &[NewNotification]) {
        for notification in notifications {
            self.sink.deliver(notification);
        }
    }
}

fn validate_user(user_id: UserId) -> Result<()> {
    if user_id <= 0 {
        return Err(ProgressionError::Validation(format!(
            "user id must be positive, got {}",
            user_id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Amount {
    Xp(i64),
    Points(i64),
    Both { xp: i64, points: i64 },
}

/// A pending grant in the work queue
#[derive(Debug, Clone)]
struct Reward {
    amount: Amount,
    activity_type: String,
    data: Option<Value>,
}

impl Reward {
    fn new(amount: Amount, activity_type: &str, data: Option<Value>) -> Self {
        Self {
            amount,
            activity_type: activity_type.to_string(),
            data,
        }
    }
}

/// State of one reward operation, alive for the length of its transaction
struct Cascade<'a> {
    conn: &'a Connection,
    user_id: UserId,
    settings: &'a ProgressionSettings,
    curve: &'a ProgressionCurve,
    ledger: &'a RewardLedger,
    facts: &'a dyn FactProvider,
    catalog: &'a [Achievement],
    queue: VecDeque<Reward>,
    events: Vec<ProgressionEvent>,
    notifications: Vec<NewNotification>,
    steps: usize,
    limit: usize,
}

impl<'a> Cascade<'a> {
    /// Count one unit of work against the cap
    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limit {
            warn!(
                user_id = self.user_id,
                limit = self.limit,
                "Reward cascade hit its step cap, rolling back"
            );
            return Err(ProgressionError::CascadeLimitExceeded { limit: self.limit });
        }
        Ok(())
    }

    /// Apply queued rewards until none are left
    fn drain(&mut self) -> Result<()> {
        while let Some(reward) = self.queue.pop_front() {
            self.tick()?;
            self.apply(reward)?;
            self.scan()?;
        }
        Ok(())
    }

    /// Grant one reward and bring the stored level up to date
    fn apply(&mut self, reward: Reward) -> Result<()> {
        let data = reward.data.as_ref();
        let activity_type = reward.activity_type.as_str();

        let grant = match reward.amount {
            Amount::Xp(xp) => Grant {
                xp: self
                    .ledger
                    .grant_xp(self.conn, self.user_id, xp, activity_type, data)?,
                points: 0,
            },
            Amount::Points(points) => Grant {
                xp: 0,
                points: self
                    .ledger
                    .grant_points(self.conn, self.user_id, points, activity_type, data)?,
            },
            Amount::Both { xp, points } => {
                self.ledger
                    .grant(self.conn, self.user_id, xp, points, activity_type, data)?
            }
        };

        if grant.is_empty() {
            return Ok(());
        }

        let totals = progress::add_totals(self.conn, self.user_id, grant.xp, grant.points)?;

        if grant.xp > 0 {
            self.events.push(ProgressionEvent::XpAwarded {
                user_id: self.user_id,
                amount: grant.xp,
                activity_type: activity_type.to_string(),
            });
        }
        if grant.points > 0 {
            self.events.push(ProgressionEvent::PointsAwarded {
                user_id: self.user_id,
                amount: grant.points,
                activity_type: activity_type.to_string(),
            });
        }

        let new_level = self.curve.level_for_xp(totals.total_xp);
        if new_level != totals.previous_level {
            progress::set_level(self.conn, self.user_id, new_level)?;
        }
        if new_level > totals.previous_level {
            info!(
                user_id = self.user_id,
                old_level = totals.previous_level,
                new_level,
                "Level up"
            );
            self.events.push(ProgressionEvent::LevelUp {
                user_id: self.user_id,
                old_level: totals.previous_level,
                new_level,
            });
            self.notify(NewNotification::level_up(self.user_id, new_level))?;
        }

        Ok(())
    }

    /// Evaluate the catalog until a full pass completes nothing new
    fn scan(&mut self) -> Result<()> {
        let catalog = self.catalog;

        loop {
            let completed = progress::completed_achievement_ids(self.conn, self.user_id)?;
            let mut unlocked = 0;

            for achievement in catalog {
                if completed.contains(&achievement.id) {
                    continue;
                }

                let evaluation = {
                    let reader = FactReader::new(self.conn, self.user_id, self.facts);
                    RequirementEvaluator::evaluate_achievement(&reader, achievement)?
                };

                if evaluation.satisfied {
                    if self.complete(achievement)? {
                        unlocked += 1;
                    }
                } else if evaluation.progress > 0 {
                    progress::record_progress(
                        self.conn,
                        self.user_id,
                        achievement.id,
                        evaluation.progress,
                    )?;
                }
            }

            if unlocked == 0 {
                return Ok(());
            }
        }
    }

    /// Pass the completion gate and queue the achievement's rewards.
    ///
    /// Returns `false` when the achievement was already completed.
    fn complete(&mut self, achievement: &Achievement) -> Result<bool> {
        if !progress::mark_completed(self.conn, self.user_id, achievement.id)? {
            return Ok(false);
        }
        self.tick()?;

        info!(user_id = self.user_id, slug = %achievement.slug, "Achievement unlocked");
        self.events.push(ProgressionEvent::AchievementUnlocked {
            user_id: self.user_id,
            achievement_id: achievement.id,
            slug: achievement.slug.clone(),
            name: achievement.name.clone(),
        });

        let data = json!({ "achievement_id": achievement.id, "slug": achievement.slug });
        if achievement.xp_reward > 0 {
            self.queue.push_back(Reward::new(
                Amount::Xp(achievement.xp_reward),
                ACHIEVEMENT_ACTIVITY,
                Some(data.clone()),
            ));
        }
        if achievement.points > 0 {
            self.queue.push_back(Reward::new(
                Amount::Points(achievement.points),
                ACHIEVEMENT_ACTIVITY,
                Some(data),
            ));
        }

        self.notify(NewNotification::achievement_unlocked(self.user_id, achievement))?;
        Ok(true)
    }

    fn notify(&mut self, notification: NewNotification) -> Result<()> {
        if self.settings.notifications_enabled {
            progress::insert_notification(self.conn, &notification)?;
            self.notifications.push(notification);
        }
        Ok(())
    }

    fn finish(self) -> (AwardReport, Vec<NewNotification>) {
        (
            AwardReport {
                applied: true,
                events: self.events,
            },
            self.notifications,
        )
    }
}
