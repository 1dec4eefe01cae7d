//! Aggregate command - windows, coherence and conflicts for a note file
//!
//! Usage:
//! ```bash
//! cadence aggregate notes.json
//! cadence aggregate notes.json --window-ms 1000
//! cadence aggregate notes.json --multi-scale --json
//! cadence aggregate notes.json --prompt 5
//! ```

use anyhow::{Context, Result};
use cadence_temporal::{
    format_for_prompt, Aggregate, AggregationResult, CoherenceOutcome, NotePruner,
    WindowedAggregator,
};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::{coherence_colored, load_notes, ConfigArgs};
use crate::{print_field, print_warning};

/// Arguments for the aggregate command
#[derive(Args)]
pub struct AggregateArgs {
    /// JSON array of notes
    #[arg(value_name = "NOTES")]
    notes: PathBuf,

    /// Window size; defaults to the primary scale
    #[arg(long, short = 'w', value_name = "MS")]
    window_ms: Option<u64>,

    /// Aggregate at every configured scale
    #[arg(long, conflicts_with = "window_ms")]
    multi_scale: bool,

    /// Render a prompt block with the N highest-weighted notes
    #[arg(long, value_name = "N", conflicts_with = "multi_scale")]
    prompt: Option<usize>,

    /// Print the raw result as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Run the aggregate command
pub fn run(args: AggregateArgs) -> Result<()> {
    let config = args.config.load()?;
    let notes = load_notes(&args.notes)?;
    let window_ms = args.window_ms.unwrap_or_else(|| config.primary_window_ms());
    let aggregator = WindowedAggregator::new(config.clone())?;

    if args.multi_scale {
        let multi = aggregator.aggregate_configured_scales(&notes);
        if args.json {
            let json = serde_json::to_string_pretty(&multi).context("Failed to encode result")?;
            println!("{}", json);
            return Ok(());
        }
        println!("{}", "Cadence Multi-Scale Aggregation".bold().cyan());
        println!("{}", "═".repeat(40).cyan());
        println!();
        print_field("Notes", notes.len());
        print_field("Cross-scale coherence", coherence_colored(multi.coherence));
        for (name, result) in &multi.scales {
            println!();
            println!("{} {}", name.bold(), format!("({}ms)", result.window_size_ms).dimmed());
            print_result(result);
        }
        return Ok(());
    }

    let result = aggregator.aggregate(&notes, window_ms);

    if let Some(top_n) = args.prompt {
        let selected = NotePruner::from_config(&config).select_top_weighted(&notes, top_n);
        println!("{}", format_for_prompt(&result, &selected));
        return Ok(());
    }

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to encode result")?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}", "Cadence Aggregation".bold().cyan());
    println!("{}", "═".repeat(40).cyan());
    println!();
    print_field("Notes", format!("{} ({} scored)", result.note_count, result.scored_note_count));
    print_field("Window", format!("{}ms", window_ms));
    print_result(&result);
    Ok(())
}

fn print_result(result: &AggregationResult) {
    print_field("Windows", result.windows.len());
    print_field("Coherence", coherence_colored(result.coherence));
    if let CoherenceOutcome::Degenerate(reason) = &result.coherence_outcome {
        print_field("Degenerate", format!("{:?}", reason).dimmed());
    }
    if let Some(breakdown) = &result.breakdown {
        print_field(
            "Signals",
            format!(
                "direction {:.2}, stability {:.2}, variance {:.2}, observations {:.2}",
                breakdown.direction_consistency,
                breakdown.stability,
                breakdown.variance_coherence,
                breakdown.observation_consistency
            ),
        );
    }
    if let Some(score) = result.weighted_score {
        print_field("Weighted score", format!("{:.2}", score));
    }
    for conflict in &result.conflicts {
        print_warning(&conflict.reason);
    }
    print_field("Summary", &result.summary);
}
