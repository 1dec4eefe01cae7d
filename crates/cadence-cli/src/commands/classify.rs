//! Classify command - activity level and stability of a note file
//!
//! Usage:
//! ```bash
//! cadence classify notes.json
//! cadence classify notes.json --at 1700000000000 --json
//! ```

use anyhow::{Context, Result};
use cadence_router::{ActivityClassifier, ActivityLevel};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::{load_notes, ConfigArgs};
use crate::print_field;

/// Arguments for the classify command
#[derive(Args)]
pub struct ClassifyArgs {
    /// JSON array of notes
    #[arg(value_name = "NOTES")]
    notes: PathBuf,

    /// Classify the lookback ending here instead of at the latest note
    #[arg(long, value_name = "TIMESTAMP_MS")]
    at: Option<i64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Run the classify command
pub fn run(args: ClassifyArgs) -> Result<()> {
    let config = args.config.load()?;
    let notes = load_notes(&args.notes)?;
    let classifier = ActivityClassifier::from_config(&config);

    let report = match args.at {
        Some(now) => classifier.classify_at(&notes, now),
        None => classifier.classify(&notes),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", json);
        return Ok(());
    }

    let level = match report.level {
        ActivityLevel::Low => report.level.to_string().green(),
        ActivityLevel::Medium => report.level.to_string().yellow(),
        ActivityLevel::High => report.level.to_string().red(),
    };

    println!("{}", "Cadence Activity".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!();
    print_field("Level", level.bold());
    print_field("Rate", format!("{:.2} notes/s", report.rate_per_sec));
    print_field(
        "Lookback",
        format!("{} notes in {}ms", report.notes_in_lookback, config.activity_lookback_ms),
    );
    print_field("User interaction", yes_no(report.has_user_interaction));
    print_field("Stable", yes_no(report.is_stable));
    Ok(())
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".dimmed()
    }
}
