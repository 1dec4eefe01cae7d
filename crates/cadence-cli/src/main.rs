//! Cadence CLI - inspect note streams from the command line
//!
//! # Usage
//!
//! ```bash
//! # Aggregate a note file at the primary scale
//! cadence aggregate notes.json
//!
//! # Every configured scale, as JSON
//! cadence aggregate notes.json --multi-scale --json
//!
//! # Classify recent activity
//! cadence classify notes.json
//!
//! # Route through the adaptive processor, one note at a time
//! cadence process notes.json --replay
//!
//! # Show version and configuration
//! cadence info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{aggregate, classify, info, process};

/// Cadence - temporal aggregation for observation streams
#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Cadence CLI - Temporal note aggregation",
    long_about = "Cadence condenses timestamped observation notes into\n\
                  time-decayed, multi-scale summaries with a coherence score.\n\n\
                  Note files are JSON arrays of {timestamp, score?, observation?, tags?}."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate notes into windows with coherence
    #[command(name = "aggregate")]
    Aggregate(aggregate::AggregateArgs),

    /// Classify recent activity
    #[command(name = "classify")]
    Classify(classify::ClassifyArgs),

    /// Route notes through the adaptive processor
    #[command(name = "process")]
    Process(process::ProcessArgs),

    /// Show version and configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Aggregate(args) => aggregate::run(args),
        Commands::Classify(args) => classify::run(args),
        Commands::Process(args) => process::run(args).await,
        Commands::Info(args) => info::run(args),
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

/// Print a labelled value
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).dimmed(), value);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}
