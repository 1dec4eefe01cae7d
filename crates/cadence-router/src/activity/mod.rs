//! Activity Classifier - input-rate analysis over a lookback window

use cadence_core::config::{HIGH_ACTIVITY_RATE, MEDIUM_ACTIVITY_RATE, STABILITY_TAIL};
use cadence_core::{sorted_by_time, AggregationConfig, Note};
use cadence_temporal::coherence::population_variance;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of the note arrival rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityLevel {
    /// At most one note per second
    Low,
    /// More than one and at most ten notes per second
    Medium,
    /// More than ten notes per second
    High,
}

impl ActivityLevel {
    pub fn from_rate(rate_per_sec: f64) -> Self {
        if rate_per_sec > HIGH_ACTIVITY_RATE {
            Self::High
        } else if rate_per_sec > MEDIUM_ACTIVITY_RATE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        f.write_str(name)
    }
}

/// Classification of recent activity; recomputed on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub level: ActivityLevel,
    /// Notes per second inside the lookback
    pub rate_per_sec: f64,
    pub notes_in_lookback: usize,
    /// Any interaction-tagged note inside the lookback
    pub has_user_interaction: bool,
    /// Variance of the last scores is below the threshold
    pub is_stable: bool,
}

impl ActivityReport {
    /// A report with the given level and no other signal, for forcing a route
    pub fn forced(level: ActivityLevel, is_stable: bool) -> Self {
        Self {
            level,
            rate_per_sec: 0.0,
            notes_in_lookback: 0,
            has_user_interaction: false,
            is_stable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    lookback_ms: u64,
    stability_variance_threshold: f64,
}

impl ActivityClassifier {
    pub fn new(lookback_ms: u64, stability_variance_threshold: f64) -> Self {
        Self {
            lookback_ms: lookback_ms.max(1),
            stability_variance_threshold,
        }
    }

    pub fn from_config(config: &AggregationConfig) -> Self {
        Self::new(
            config.activity_lookback_ms,
            config.stability_variance_threshold,
        )
    }

    /// Classify relative to the latest note
    pub fn classify(&self, notes: &[Note]) -> ActivityReport {
        let now = notes.iter().map(|n| n.timestamp).max().unwrap_or(0);
        self.classify_at(notes, now)
    }

    /// Classify the lookback ending at `now`
    pub fn classify_at(&self, notes: &[Note], now: i64) -> ActivityReport {
        let lookback = i64::try_from(self.lookback_ms).unwrap_or(i64::MAX);
        let since = now.saturating_sub(lookback);
        let recent: Vec<&Note> = notes
            .iter()
            .filter(|n| n.timestamp > since && n.timestamp <= now)
            .collect();

        let lookback_sec = self.lookback_ms as f64 / 1_000.0;
        let rate_per_sec = recent.len() as f64 / lookback_sec;

        ActivityReport {
            level: ActivityLevel::from_rate(rate_per_sec),
            rate_per_sec,
            notes_in_lookback: recent.len(),
            has_user_interaction: recent.iter().any(|n| n.is_interaction()),
            is_stable: self.is_stable(notes),
        }
    }

    /// Variance of the last [`STABILITY_TAIL`] scores is below the threshold.
    /// Fewer than two scores count as stable.
    pub fn is_stable(&self, notes: &[Note]) -> bool {
        let sorted = sorted_by_time(notes);
        let tail: Vec<f64> = sorted
            .iter()
            .rev()
            .filter_map(|n| n.score)
            .take(STABILITY_TAIL)
            .collect();
        if tail.len() < 2 {
            return true;
        }
        let variance = population_variance(&tail);
        variance.is_finite() && variance < self.stability_variance_threshold
    }
}

impl Default for ActivityClassifier {
    fn default() -> Self {
        Self::from_config(&AggregationConfig::default())
    }
}
