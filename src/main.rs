use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "progression")]
#[command(about = "XP, levels, achievements and badges for community sites")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to .progression/config.toml, then ~/.progression/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .progression/config.toml
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
        /// Write ~/.progression/config.toml instead
        #[arg(long)]
        global: bool,
    },

    /// Award XP to a user
    AwardXp {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        amount: i64,
        /// Activity type written to the activity log
        #[arg(long, default_value = "manual")]
        activity: String,
        /// Extra JSON stored with the log entry
        #[arg(long)]
        data: Option<String>,
    },

    /// Award points to a user
    AwardPoints {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "manual")]
        activity: String,
        #[arg(long)]
        data: Option<String>,
    },

    /// Record a standard host activity (e.g. article_create, user_login)
    Activity {
        #[arg(long)]
        user: i64,
        /// Activity name
        kind: String,
        #[arg(long)]
        data: Option<String>,
    },

    /// Check achievements and badges for users
    Check {
        /// Users to check
        users: Vec<i64>,
        /// Check every known user
        #[arg(long, conflicts_with = "users")]
        all: bool,
    },

    /// Check badges only
    Badges {
        #[arg(long)]
        user: i64,
    },

    /// Manually grant an achievement (requirements must be met)
    Grant {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        slug: String,
    },

    /// Show a user's level and progress
    Level {
        #[arg(long)]
        user: i64,
    },

    /// Show the leaderboard
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Only users with a completed achievement in this category
        #[arg(long)]
        category: Option<i64>,
    },

    /// List or acknowledge a user's notifications
    Notifications {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        unread: bool,
        /// Mark this notification as read
        #[arg(long)]
        mark_read: Option<i64>,
    },

    /// Show a user's achievement breakdown
    Stats {
        #[arg(long)]
        user: i64,
    },

    /// Show engine-wide counters and effective settings
    Status,

    /// Manage the achievement and badge catalogs
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Delete all progression state for a user (activity log is kept)
    Reset {
        #[arg(long)]
        user: i64,
        /// Required to actually delete
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Upsert achievements and badges from a TOML file
    Import { file: PathBuf },
    /// List active achievements and badges
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config_path, db_path) = (cli.config, cli.db);
    let context = || cli::Context::load(config_path.as_deref(), db_path.as_deref());

    match cli.command {
        Commands::Init { force, global } => {
            if global {
                cli::init::init_global_command(force)?
            } else {
                cli::init::init_command(&PathBuf::from("."), force)?
            }
        }
        Commands::AwardXp {
            user,
            amount,
            activity,
            data,
        } => cli::award::award_xp_command(&context()?, user, amount, &activity, data.as_deref())?,
        Commands::AwardPoints {
            user,
            amount,
            activity,
            data,
        } => cli::award::award_points_command(&context()?, user, amount, &activity, data.as_deref())?,
        Commands::Activity { user, kind, data } => {
            cli::award::activity_command(&context()?, user, &kind, data.as_deref())?
        }
        Commands::Check { users, all } => cli::award::check_command(&context()?, &users, all)?,
        Commands::Badges { user } => cli::award::badges_command(&context()?, user)?,
        Commands::Grant { user, slug } => cli::award::grant_command(&context()?, user, &slug)?,
        Commands::Level { user } => cli::report::level_command(&context()?, user)?,
        Commands::Leaderboard { limit, category } => {
            cli::report::leaderboard_command(&context()?, limit, category)?
        }
        Commands::Notifications {
            user,
            limit,
            unread,
            mark_read,
        } => cli::report::notifications_command(&context()?, user, limit, unread, mark_read)?,
        Commands::Stats { user } => cli::report::stats_command(&context()?, user)?,
        Commands::Status => cli::report::status_command(&context()?)?,
        Commands::Catalog { action } => match action {
            CatalogAction::Import { file } => cli::admin::catalog_import_command(&context()?, &file)?,
            CatalogAction::List => cli::admin::catalog_list_command(&context()?)?,
        },
        Commands::Reset { user, yes } => cli::admin::reset_command(&context()?, user, yes)?,
    }

    Ok(())
}
