//! Subcommands and the file loading they share

pub mod aggregate;
pub mod classify;
pub mod info;
pub mod process;

use anyhow::{Context, Result};
use cadence_core::{AggregationConfig, Note};
use clap::Args;
use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};

/// Where the aggregation config comes from
#[derive(Args)]
pub struct ConfigArgs {
    /// JSON config file; missing fields take defaults.
    /// Without it, CADENCE_* environment variables are applied to the defaults.
    #[arg(long, short = 'c', value_name = "FILE", env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<AggregationConfig> {
        match &self.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let config: AggregationConfig = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse config JSON: {}", path.display()))?;
                config.validate().context("Invalid configuration")?;
                Ok(config)
            }
            None => AggregationConfig::from_env().context("Invalid CADENCE_* environment"),
        }
    }
}

/// Read a JSON array of notes
pub fn load_notes(path: &Path) -> Result<Vec<Note>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read notes file: {}", path.display()))?;
    let notes: Vec<Note> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse notes JSON: {}", path.display()))?;
    tracing::info!(note_count = notes.len(), path = %path.display(), "Loaded notes");
    Ok(notes)
}

/// Coherence rendered with its stability color
pub fn coherence_colored(coherence: f64) -> ColoredString {
    let text = format!("{:.3}", coherence);
    if coherence >= 0.7 {
        text.green()
    } else if coherence >= 0.4 {
        text.yellow()
    } else {
        text.red()
    }
}
