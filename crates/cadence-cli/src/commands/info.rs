//! Info command - Show version and effective configuration
//!
//! Usage:
//! ```bash
//! cadence info
//! cadence info --config cadence.json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::ConfigArgs;
use crate::print_field;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

/// Run the info command
pub fn run(args: InfoArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let config = args.config.load()?;

    println!("{}", "Cadence - Temporal Note Aggregation".bold().cyan());
    println!("{}", "═".repeat(50).cyan());
    println!();

    println!("{}", "Version Information:".bold());
    print_field("CLI Version", version.green());
    println!();

    println!("{}", "Aggregation:".bold());
    print_field("Window size", format!("{}ms", config.window_size_ms));
    print_field("Decay factor", config.decay_factor);
    print_field("Primary window", format!("{}ms", config.primary_window_ms()));
    print_field("Conflict threshold", config.conflict_threshold);
    let weights = &config.coherence_weights;
    print_field(
        "Coherence weights",
        format!(
            "direction {}, stability {}, variance {}, observations {}",
            weights.direction_consistency,
            weights.stability,
            weights.variance_coherence,
            weights.observation_consistency
        ),
    );
    println!();

    println!("{}", "Scales:".bold());
    for (name, window_ms) in &config.scales {
        println!("  {} {} {}", "•".cyan(), name.green(), format!("{}ms", window_ms).dimmed());
    }
    println!();

    println!("{}", "Routing:".bold());
    print_field("Activity lookback", format!("{}ms", config.activity_lookback_ms));
    print_field("Max cache age", format!("{}ms", config.max_cache_age_ms));
    print_field("Max new notes before stale", config.max_note_delta);
    print_field("Stability variance", config.stability_variance_threshold);
    println!();

    println!("{}", "Configuration:".bold());
    println!("  {} Pass --config FILE or set CADENCE_* environment variables", "ℹ".blue());
    println!();

    Ok(())
}
