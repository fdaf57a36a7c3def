//! Reward commands

use anyhow::{Context as _, Result, anyhow};
use serde_json::Value;

use progression_engine::{Activity, AwardReport, ProgressionEvent};

use super::Context;

fn parse_data(data: Option<&str>) -> Result<Option<Value>> {
    data.map(|raw| serde_json::from_str(raw).with_context(|| format!("Invalid JSON data: {}", raw)))
        .transpose()
}

fn print_report(report: &AwardReport) {
    if !report.applied {
        println!("Skipped: progression (or the level system) is disabled.");
        return;
    }
    if report.events.is_empty() {
        println!("Nothing new.");
        return;
    }

    for event in &report.events {
        match event {
            ProgressionEvent::XpAwarded {
                amount,
                activity_type,
                ..
            } => println!("  +{} XP ({})", amount, activity_type),
            ProgressionEvent::PointsAwarded {
                amount,
                activity_type,
                ..
            } => println!("  +{} points ({})", amount, activity_type),
            ProgressionEvent::LevelUp {
                old_level,
                new_level,
                ..
            } => println!("  Level up: {} -> {}", old_level, new_level),
            ProgressionEvent::AchievementUnlocked { slug, name, .. } => {
                println!("  Achievement unlocked: {} [{}]", name, slug)
            }
            ProgressionEvent::BadgeEarned { slug, name, .. } => {
                println!("  Badge earned: {} [{}]", name, slug)
            }
        }
    }
}

pub fn award_xp_command(
    ctx: &Context,
    user: i64,
    amount: i64,
    activity: &str,
    data: Option<&str>,
) -> Result<()> {
    let report = ctx
        .coordinator()?
        .award_xp(user, amount, activity, parse_data(data)?)?;
    print_report(&report);
    Ok(())
}

pub fn award_points_command(
    ctx: &Context,
    user: i64,
    amount: i64,
    activity: &str,
    data: Option<&str>,
) -> Result<()> {
    let report = ctx
        .coordinator()?
        .award_points(user, amount, activity, parse_data(data)?)?;
    print_report(&report);
    Ok(())
}

pub fn activity_command(ctx: &Context, user: i64, kind: &str, data: Option<&str>) -> Result<()> {
    let activity: Activity = kind.parse().map_err(|e: String| anyhow!(e))?;
    let report = ctx
        .coordinator()?
        .record_activity(user, activity, parse_data(data)?)?;
    print_report(&report);
    Ok(())
}

pub fn check_command(ctx: &Context, users: &[i64], all: bool) -> Result<()> {
    let users = if all { ctx.db.known_users()? } else { users.to_vec() };
    if users.is_empty() {
        println!("No users to check.");
        return Ok(());
    }

    let summary = ctx.coordinator()?.check_all(&users);
    println!(
        "Checked {} users: {} achievements unlocked, {} badges awarded",
        summary.users_checked, summary.achievements_unlocked, summary.badges_awarded
    );
    for (user, error) in &summary.failures {
        eprintln!("  user {}: {}", user, error);
    }
    Ok(())
}

pub fn badges_command(ctx: &Context, user: i64) -> Result<()> {
    let report = ctx.coordinator()?.check_and_award_badges(user)?;
    print_report(&report);
    Ok(())
}

/// Manual grant; refusals are reported as plain messages
pub fn grant_command(ctx: &Context, user: i64, slug: &str) -> Result<()> {
    let result = ctx
        .coordinator()?
        .award_achievement_by_slug(user, slug)
        .and_then(AwardReport::ensure_applied);
    match result {
        Ok(report) => print_report(&report),
        Err(e) if e.is_refusal() => println!("Not granted: {}", e),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
