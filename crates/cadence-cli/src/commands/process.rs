//! Process command - route a note file through the adaptive processor
//!
//! Usage:
//! ```bash
//! cadence process notes.json
//! cadence process notes.json --replay
//! ```

use anyhow::{Context, Result};
use cadence_core::NoteStore;
use cadence_router::{AdaptiveProcessor, ProcessOutcome, Provenance};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use super::{coherence_colored, load_notes, ConfigArgs};
use crate::print_field;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// Arguments for the process command
#[derive(Args)]
pub struct ProcessArgs {
    /// JSON array of notes
    #[arg(value_name = "NOTES")]
    notes: PathBuf,

    /// Append notes one at a time and route after each
    #[arg(long)]
    replay: bool,

    /// Print the final outcome and statistics as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Run the process command
pub async fn run(args: ProcessArgs) -> Result<()> {
    let config = args.config.load()?;
    let notes = load_notes(&args.notes)?;
    let processor = AdaptiveProcessor::new(config)?;

    let outcome = if args.replay {
        let store = NoteStore::new();
        let mut last = None;
        let mut previous: Option<Provenance> = None;
        for note in notes {
            let timestamp = note.timestamp;
            store.append(note);
            let outcome = processor.process_store(&store);
            if !args.json && previous != Some(outcome.provenance) {
                println!(
                    "{} {} {}",
                    format!("[{}ms]", timestamp).dimmed(),
                    provenance_colored(outcome.provenance),
                    format!("({}, {})", outcome.activity.level, outcome.reason).dimmed()
                );
            }
            previous = Some(outcome.provenance);
            last = Some(outcome);
            // Lets scheduled refreshes install between appends
            tokio::task::yield_now().await;
        }
        last
    } else {
        Some(processor.process(&notes))
    };

    settle(&processor).await;
    processor.shutdown();

    let stats = processor.stats();
    if args.json {
        let report = serde_json::json!({ "outcome": outcome, "stats": stats });
        let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", json);
        return Ok(());
    }

    let Some(outcome) = outcome else {
        println!("{}", "No notes to process".yellow());
        return Ok(());
    };

    if args.replay {
        println!();
    }
    print_outcome(&outcome);
    println!();
    println!("{}", "Statistics:".bold());
    print_field("Requests", stats.requests);
    print_field(
        "Cache hits",
        format!("{} ({:.0}%)", stats.cache_hits, stats.cache_hit_rate * 100.0),
    );
    print_field("Light recomputes", stats.light_recomputes);
    print_field("Full recomputes", stats.full_recomputes);
    print_field("Background refreshes", stats.background_refreshes);
    print_field(
        "Refreshes",
        format!(
            "{} completed, {} coalesced, {} discarded",
            stats.refresh.completed, stats.refresh.coalesced, stats.refresh.discarded
        ),
    );
    Ok(())
}

/// Wait for an in-flight background refresh, bounded
async fn settle(processor: &AdaptiveProcessor) {
    let waited = tokio::time::timeout(SETTLE_TIMEOUT, async {
        while processor.cache().is_refreshing() {
            tokio::time::sleep(SETTLE_POLL).await;
        }
    })
    .await;
    if waited.is_err() {
        tracing::warn!("Background refresh still running at shutdown");
    }
}

fn print_outcome(outcome: &ProcessOutcome) {
    println!("{}", "Cadence Processor".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!();
    print_field("Provenance", provenance_colored(outcome.provenance));
    print_field("Activity", &outcome.activity.level);
    print_field("Reason", &outcome.reason);
    print_field("Coherence", coherence_colored(outcome.result.coherence));
    if let Some(multi) = &outcome.multi_scale {
        print_field("Scales", multi.scales.keys().cloned().collect::<Vec<_>>().join(", "));
    }
    print_field("Summary", &outcome.result.summary);
}

fn provenance_colored(provenance: Provenance) -> colored::ColoredString {
    let text = provenance.to_string();
    match provenance {
        Provenance::Cache => text.green(),
        Provenance::RecomputedLight => text.yellow(),
        Provenance::RecomputedFull => text.cyan(),
    }
}
