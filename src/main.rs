//! Fiscal Ledger CLI
//!
//! Every command opens the ledger first, which blocks on the key migration.
//! A failed migration ends the process with a non-zero exit code before
//! any command runs.
//!
//! ## Usage
//!
//! ```bash
//! # Upgrade the store and report what changed
//! fiscal-ledger migrate
//!
//! # Weeks with data, most recent first
//! fiscal-ledger weeks
//!
//! # Goal progress through Wednesday of a week
//! fiscal-ledger summary --week 2024/2025-07 --day wednesday
//!
//! # Backups
//! fiscal-ledger export-data backup.json
//! fiscal-ledger import backup.json
//!
//! # Use another storage directory
//! fiscal-ledger --storage-dir /data/ledger weeks
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fiscal_ledger::aggregation::{EntityKind, Metric};
use fiscal_ledger::calendar::{self, Day};
use fiscal_ledger::{key, Config, Ledger};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fiscal-ledger")]
#[command(about = "Budget-year indexed record store for weekly retail reporting")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "FISCAL_LEDGER_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring the store up to the current schema version
    Migrate,

    /// List weeks with data, most recent first
    Weeks,

    /// Print the record key of the current week
    CurrentWeek,

    /// Goal progress for one day of a week
    Summary {
        /// Week record key (defaults to the current week)
        #[arg(long)]
        week: Option<String>,

        /// Reporting day, Monday..Saturday
        #[arg(long, default_value = "Saturday")]
        day: String,
    },

    /// Write people, services, goals and settings to a JSON file
    ExportConfig { path: PathBuf },

    /// Write every stored week to a JSON file
    ExportData { path: PathBuf },

    /// Import a configuration or user data file
    Import { path: PathBuf },

    /// Delete weekly records, or everything with --all
    Reset {
        #[arg(long)]
        all: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fiscal_ledger=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if args.config.is_none() {
        if config_path.exists() {
            let storage_dir = config.storage_dir.clone();
            config = Config::load(&config_path)?;
            config.storage_dir = storage_dir;
        } else {
            config.save(&config_path)?;
            info!(path = %config_path.display(), "Created default config");
        }
    }

    let ledger = Ledger::open(&config).context("opening ledger")?;

    match args.command {
        Command::Migrate => {
            let report = ledger.migration();
            println!(
                "schema version {} -> {}: {} keys rewritten, {} merged",
                report.from_version, report.to_version, report.rewritten, report.merged
            );
        }
        Command::Weeks => {
            for week_key in ledger.available_weeks()? {
                println!("{}", week_key);
            }
        }
        Command::CurrentWeek => {
            let period = calendar::current_period()?;
            let range = period.date_range()?;
            println!(
                "{} ({} .. {})",
                key::encode(period)?,
                range.first_day,
                range.last_day
            );
        }
        Command::Summary { week, day } => {
            let week_key = match week {
                Some(k) => key::normalize(&k)?,
                None => key::encode(calendar::current_period()?)?,
            };
            let day: Day = day.parse()?;
            print_summary(&ledger, &week_key, day)?;
        }
        Command::ExportConfig { path } => {
            let json = serde_json::to_string_pretty(&ledger.export_config()?)?;
            std::fs::write(&path, json)?;
            info!(path = %path.display(), "Exported configuration");
        }
        Command::ExportData { path } => {
            let data = ledger.export_user_data()?;
            std::fs::write(&path, serde_json::to_string_pretty(&data)?)?;
            info!(path = %path.display(), weeks = data.len(), "Exported user data");
        }
        Command::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let summary = ledger.import_json(&json)?;
            println!(
                "imported {} config sections, {} weeks, {} line items",
                summary.sections, summary.weeks, summary.line_items
            );
        }
        Command::Reset { all } => {
            let removed = if all {
                ledger.reset_all()?
            } else {
                ledger.reset_user_data()?
            };
            println!("removed {} records", removed);
        }
    }

    Ok(())
}

fn print_summary(ledger: &Ledger, week_key: &str, day: Day) -> anyhow::Result<()> {
    let engine = ledger.week(week_key)?;
    let progress = engine.combined_progress(day);

    println!("{} through {}", week_key, day);
    for section in &progress.sections {
        println!(
            "  {:<22} {:>10.2} / {:>10.2}  {:>5.1}%",
            section.section.goal_name(),
            section.actual,
            section.goal,
            section.ratio * 100.0
        );
    }
    println!("  combined score {:.2}", progress.score);

    if let Some(top) = engine.top_performer(EntityKind::Avs, Metric::GrossMargin) {
        println!("  top AVS: {} ({:.2})", top.person, top.total);
    }

    let comparison = ledger.compare_with_previous(week_key)?;
    for section in comparison.sections {
        println!(
            "  vs {}: {:<22} {:+.1}%",
            key::encode(comparison.previous_period)?,
            section.section.goal_name(),
            section.change_percent
        );
    }
    Ok(())
}
