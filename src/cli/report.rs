//! Read-only reporting commands

use anyhow::Result;

use super::Context;

pub fn level_command(ctx: &Context, user: i64) -> Result<()> {
    let query = ctx.coordinator()?.query();
    let level = query.get_user_level(user)?;

    println!("User {}", user);
    println!("  Level:        {}", level.level);
    println!("  Total XP:     {}", level.total_xp);
    println!("  Points:       {}", level.total_points);
    println!("  Achievements: {}", level.total_achievements);
    println!(
        "  Progress:     {} XP into level, {} to next ({:.0}%)",
        level.current_level_xp, level.xp_to_next_level, level.progress_percent
    );

    let badges = query.get_user_badges(user)?;
    if !badges.is_empty() {
        let names: Vec<_> = badges.iter().map(|b| b.badge.name.as_str()).collect();
        println!("  Badges:       {}", names.join(", "));
    }
    Ok(())
}

pub fn leaderboard_command(ctx: &Context, limit: usize, category: Option<i64>) -> Result<()> {
    let entries = ctx.coordinator()?.query().get_leaderboard(limit, category)?;
    if entries.is_empty() {
        println!("Leaderboard is empty.");
        return Ok(());
    }

    println!("{:>4}  {:>8}  {:>5}  {:>10}  {:>8}", "#", "user", "level", "xp", "unlocks");
    for entry in entries {
        println!(
            "{:>4}  {:>8}  {:>5}  {:>10}  {:>8}",
            entry.rank, entry.user_id, entry.level, entry.total_xp, entry.total_achievements
        );
    }
    Ok(())
}

pub fn notifications_command(
    ctx: &Context,
    user: i64,
    limit: usize,
    unread: bool,
    mark_read: Option<i64>,
) -> Result<()> {
    let query = ctx.coordinator()?.query();

    if let Some(id) = mark_read {
        query.mark_notification_read(user, id)?;
        println!("Marked notification #{} as read.", id);
        return Ok(());
    }

    let notifications = query.get_notifications(user, limit, unread)?;
    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    for n in notifications {
        let marker = if n.is_read { " " } else { "*" };
        println!("{} #{} [{}] {} - {}", marker, n.id, n.kind, n.title, n.message);
    }
    Ok(())
}

pub fn stats_command(ctx: &Context, user: i64) -> Result<()> {
    let stats = ctx.coordinator()?.query().get_achievement_stats(user)?;

    println!(
        "Achievements: {}/{}",
        stats.overall.completed, stats.overall.total
    );
    println!("By category:");
    for (category, count) in &stats.by_category {
        let label = category.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        println!("  {:>6}  {}/{}", label, count.completed, count.total);
    }
    println!("By rarity:");
    for (rarity, count) in &stats.by_rarity {
        println!("  {:>10}  {}/{}", rarity.as_str(), count.completed, count.total);
    }
    Ok(())
}

pub fn status_command(ctx: &Context) -> Result<()> {
    let status = ctx.coordinator()?.query().get_status()?;
    let s = &ctx.settings;

    println!("Progression {}", if s.enabled { "enabled" } else { "disabled" });
    println!("  Database: {}", ctx.db_path.display());
    println!(
        "  Curve: {} XP for level 2, x{} per level, max level {}",
        s.xp_per_level, s.level_scaling, s.max_level
    );
    println!(
        "  Multipliers: xp x{}, points x{}",
        s.xp_multiplier, s.points_multiplier
    );
    println!(
        "  Level system: {}, notifications: {}",
        on_off(s.level_system_enabled),
        on_off(s.notifications_enabled)
    );
    println!(
        "  Catalog: {} achievements, {} badges",
        status.active_achievements, status.active_badges
    );
    println!(
        "  Users: {} ranked, {} completions, {} badges awarded",
        status.ranked_users, status.completions, status.badges_awarded
    );
    Ok(())
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}
