//! Admin commands: catalog maintenance and user reset

use anyhow::{Context as _, Result, bail};
use std::path::Path;

use progression_engine::progression::BadgeRule;
use progression_engine::store::catalog::{self, CatalogFile};

use super::Context;

pub fn catalog_import_command(ctx: &Context, file: &Path) -> Result<()> {
    let catalog = CatalogFile::from_file(file)
        .with_context(|| format!("Failed to read catalog: {}", file.display()))?;

    for badge in &catalog.badge {
        if BadgeRule::for_slug(&badge.slug).is_none() {
            eprintln!(
                "Warning: badge '{}' has no rule and will never be awarded",
                badge.slug
            );
        }
    }

    let summary = ctx
        .db
        .with_transaction(|tx| catalog::import_catalog(tx, &catalog))?;
    println!(
        "Imported {} achievements and {} badges",
        summary.achievements, summary.badges
    );
    Ok(())
}

pub fn catalog_list_command(ctx: &Context) -> Result<()> {
    let conn = ctx.db.conn()?;
    let achievements = catalog::active_achievements(&conn)?;
    let badges = catalog::active_badges(&conn)?;

    println!("Achievements ({}):", achievements.len());
    for a in achievements {
        println!(
            "  {:<24} {:<18} >= {:<6} {:>5} XP {:>4} pts  {}",
            a.slug,
            a.requirement_type,
            a.requirement_value,
            a.xp_reward,
            a.points,
            a.rarity.as_str()
        );
    }

    println!("Badges ({}):", badges.len());
    for b in badges {
        let rule = if BadgeRule::for_slug(&b.slug).is_some() { "" } else { "  (no rule)" };
        println!("  {:<24} {:>5} XP {:>4} pts{}", b.slug, b.xp_reward, b.points, rule);
    }
    Ok(())
}

pub fn reset_command(ctx: &Context, user: i64, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to reset user {} without --yes", user);
    }
    ctx.db.reset_user(user)?;
    println!("Reset progression for user {}", user);
    Ok(())
}
