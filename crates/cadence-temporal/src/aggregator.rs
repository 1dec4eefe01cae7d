//! Windowed aggregation
//!
//! The [`WindowedAggregator`] turns an immutable note slice into an
//! [`AggregationResult`]: decay-weighted windows, a coherence score, the
//! conflicts between adjacent windows and a short summary. Every pass is
//! recomputed from scratch, so running it twice on the same notes yields
//! the same result.

use cadence_core::config::{HIGH_CONFIDENCE_NOTES, MAX_SUMMARY_CHARS};
use cadence_core::{AggregationConfig, ConfigError, Note};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::coherence::{self, CoherenceBreakdown, CoherenceOutcome, Degeneracy};
use crate::window::{partition, Window};

/// Two adjacent windows moving in opposite directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Index of the earlier window in [`AggregationResult::windows`]
    pub window_a: usize,
    /// Index of the later window
    pub window_b: usize,
    pub window_a_start: i64,
    pub window_b_start: i64,
    pub reason: String,
}

/// Result of one aggregation pass at one scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Window size this result was computed at
    pub window_size_ms: u64,
    /// Windows in non-decreasing start order
    pub windows: Vec<Window>,
    /// Coherence in [0, 1]
    pub coherence: f64,
    /// How `coherence` was obtained
    pub coherence_outcome: CoherenceOutcome,
    /// Sub-signals, when they could be computed
    pub breakdown: Option<CoherenceBreakdown>,
    pub conflicts: Vec<Conflict>,
    /// Recency-weighted mean of window scores
    pub weighted_score: Option<f64>,
    pub note_count: usize,
    pub scored_note_count: usize,
    /// Bounded, human-readable summary
    pub summary: String,
}

impl AggregationResult {
    /// Result for an empty note sequence
    pub fn empty(window_size_ms: u64) -> Self {
        Self {
            window_size_ms,
            windows: Vec::new(),
            coherence: 1.0,
            coherence_outcome: CoherenceOutcome::Degenerate(Degeneracy::TooFewWindows {
                windows: 0,
            }),
            breakdown: None,
            conflicts: Vec::new(),
            weighted_score: None,
            note_count: 0,
            scored_note_count: 0,
            summary: String::from("No notes recorded."),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Start-time of the latest window
    pub fn latest_window_start(&self) -> Option<i64> {
        self.windows.last().map(|w| w.start_time)
    }
}

/// Results for every configured scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiScaleResult {
    pub scales: BTreeMap<String, AggregationResult>,
    /// Mean coherence across scales
    pub coherence: f64,
}

impl MultiScaleResult {
    pub fn get(&self, scale: &str) -> Option<&AggregationResult> {
        self.scales.get(scale)
    }
}

/// Something that can aggregate notes at a given window size
///
/// The Adaptive Processor and Cache Manager are generic over this, so a
/// caller can wrap the aggregator (for instance to count invocations).
pub trait Aggregate: Send + Sync {
    fn aggregate(&self, notes: &[Note], window_size_ms: u64) -> AggregationResult;

    /// One pass per scale
    fn aggregate_multi_scale(
        &self,
        notes: &[Note],
        scales: &BTreeMap<String, u64>,
    ) -> MultiScaleResult {
        let scales: BTreeMap<String, AggregationResult> = scales
            .iter()
            .map(|(name, window_ms)| (name.clone(), self.aggregate(notes, *window_ms)))
            .collect();
        let coherence = if scales.is_empty() {
            1.0
        } else {
            scales.values().map(|r| r.coherence).sum::<f64>() / scales.len() as f64
        };
        MultiScaleResult { scales, coherence }
    }
}

/// Decay-weighted, multi-resolution aggregator
#[derive(Debug, Clone)]
pub struct WindowedAggregator {
    config: AggregationConfig,
}

impl WindowedAggregator {
    /// Create an aggregator, rejecting invalid configuration
    pub fn new(config: AggregationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate at the configured `window_size_ms`
    pub fn aggregate_default(&self, notes: &[Note]) -> AggregationResult {
        self.aggregate(notes, self.config.window_size_ms)
    }

    /// Aggregate at the configured scales
    pub fn aggregate_configured_scales(&self, notes: &[Note]) -> MultiScaleResult {
        self.aggregate_multi_scale(notes, &self.config.scales)
    }

    /// Aggregate with an explicit reference time for recency weights
    pub fn aggregate_at(
        &self,
        notes: &[Note],
        window_size_ms: u64,
        now: i64,
    ) -> AggregationResult {
        if notes.is_empty() {
            return AggregationResult::empty(window_size_ms);
        }

        let windows = partition(notes, window_size_ms, self.config.decay_factor, now);
        let (outcome, breakdown) = coherence::score(&windows, &self.config.coherence_weights);
        let conflicts = find_conflicts(&windows, self.config.conflict_threshold);
        let weighted_score = weighted_score(&windows);
        let scored_note_count = windows.iter().map(|w| w.scored_count()).sum();

        let mut result = AggregationResult {
            window_size_ms,
            coherence: outcome.value(),
            coherence_outcome: outcome,
            breakdown,
            conflicts,
            weighted_score,
            note_count: notes.len(),
            scored_note_count,
            summary: String::new(),
            windows,
        };
        result.summary = summarize(&result);

        tracing::debug!(
            window_size_ms,
            note_count = result.note_count,
            windows = result.windows.len(),
            coherence = result.coherence,
            conflicts = result.conflicts.len(),
            "Aggregated notes"
        );
        result
    }
}

impl Aggregate for WindowedAggregator {
    /// Recency is measured from the latest note, so the result depends only
    /// on the notes and the configuration.
    fn aggregate(&self, notes: &[Note], window_size_ms: u64) -> AggregationResult {
        let now = notes.iter().map(|n| n.timestamp).max().unwrap_or(0);
        self.aggregate_at(notes, window_size_ms, now)
    }
}

fn weighted_score(windows: &[Window]) -> Option<f64> {
    let (sum, weight) = windows
        .iter()
        .filter_map(|w| w.avg_score.map(|s| (s * w.weight, w.weight)))
        .fold((0.0, 0.0), |(s, w), (ds, dw)| (s + ds, w + dw));
    if weight > 0.0 && (sum / weight).is_finite() {
        Some(sum / weight)
    } else {
        None
    }
}

/// Adjacent, well-populated windows whose internal trends point in
/// opposite directions by at least `threshold` score points
fn find_conflicts(windows: &[Window], threshold: f64) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for (i, pair) in windows.windows(2).enumerate() {
        let (a, b) = (&pair[0], &pair[1]);
        if a.end_time != b.start_time
            || a.note_count() < HIGH_CONFIDENCE_NOTES
            || b.note_count() < HIGH_CONFIDENCE_NOTES
        {
            continue;
        }
        let (Some(trend_a), Some(trend_b)) = (a.trend(), b.trend()) else {
            continue;
        };
        if trend_a * trend_b < 0.0 && (trend_a - trend_b).abs() >= threshold {
            conflicts.push(Conflict {
                window_a: i,
                window_b: i + 1,
                window_a_start: a.start_time,
                window_b_start: b.start_time,
                reason: format!(
                    "window at {} moved {:+.1} but window at {} moved {:+.1}",
                    a.start_time, trend_a, b.start_time, trend_b
                ),
            });
        }
    }
    conflicts
}

fn coherence_label(coherence: f64) -> &'static str {
    if coherence >= 0.7 {
        "stable"
    } else if coherence >= 0.4 {
        "mixed"
    } else {
        "erratic"
    }
}

fn trend_label(windows: &[Window]) -> &'static str {
    let scores: Vec<f64> = windows.iter().filter_map(|w| w.avg_score).collect();
    match (scores.first(), scores.last()) {
        (Some(first), Some(last)) if scores.len() >= 2 => {
            let delta = last - first;
            if delta > 0.5 {
                "improving"
            } else if delta < -0.5 {
                "declining"
            } else {
                "flat"
            }
        }
        _ => "unknown",
    }
}

fn summarize(result: &AggregationResult) -> String {
    let score = result
        .weighted_score
        .map_or_else(|| "n/a".to_string(), |s| format!("{:.1}/10", s));
    let mut summary = format!(
        "{} notes in {} windows of {}ms; coherence {:.2} ({}); weighted score {}; \
         trend {}; {} conflict(s)",
        result.note_count,
        result.windows.len(),
        result.window_size_ms,
        result.coherence,
        coherence_label(result.coherence),
        score,
        trend_label(&result.windows),
        result.conflicts.len(),
    );
    if let Some(obs) = result
        .windows
        .last()
        .and_then(|w| w.dominant_observation.as_deref())
    {
        summary.push_str("; latest: ");
        summary.push_str(obs);
    }
    truncate_chars(&summary, MAX_SUMMARY_CHARS)
}

/// Truncate on a char boundary, marking the cut with "..."
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
