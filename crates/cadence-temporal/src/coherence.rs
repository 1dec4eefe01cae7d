//! Coherence scoring
//!
//! Coherence blends four independent [0, 1] sub-signals:
//!
//! | Signal | Default weight | Measures |
//! |--------|----------------|----------|
//! | direction consistency | 0.35 | window deltas agreeing with the overall trend |
//! | stability | 0.25 | absence of local direction reversals |
//! | variance coherence | 0.25 | spread of scores, penalised by reversals |
//! | observation consistency | 0.15 | keyword overlap of dominant observations |
//!
//! Degenerate inputs never fail. Internally they are a tagged
//! [`CoherenceOutcome`]; [`CoherenceOutcome::value`] collapses them to the
//! public fallback numbers.

use cadence_core::config::{
    DEGENERATE_COHERENCE, DIRECTION_CHANGE_PENALTY, NEUTRAL_COHERENCE, VARIANCE_FLOOR,
};
use cadence_core::CoherenceWeights;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::window::Window;

const SIGN_EPSILON: f64 = 1e-9;
const MIN_KEYWORD_LEN: usize = 3;
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "was", "are", "this", "that", "but", "not", "has", "its",
];

/// Why coherence could not be computed from the data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Degeneracy {
    /// Fewer than two windows
    TooFewWindows { windows: usize },
    /// Fewer than two scored windows
    TooFewScores { scores: usize },
    /// An intermediate was NaN or infinite
    NonFinite { signal: String },
}

/// Coherence as computed, before collapsing to a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CoherenceOutcome {
    Valid { value: f64 },
    Degenerate(Degeneracy),
}

impl CoherenceOutcome {
    /// Public coherence: the value, 1.0 for too little data, 0.5 for non-finite
    pub fn value(&self) -> f64 {
        match self {
            Self::Valid { value } => *value,
            Self::Degenerate(Degeneracy::NonFinite { .. }) => NEUTRAL_COHERENCE,
            Self::Degenerate(_) => DEGENERATE_COHERENCE,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// The four sub-signals behind a valid coherence value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceBreakdown {
    pub direction_consistency: f64,
    pub stability: f64,
    pub variance_coherence: f64,
    pub observation_consistency: f64,
}

/// Score the internal consistency of a window sequence
pub fn score(
    windows: &[Window],
    weights: &CoherenceWeights,
) -> (CoherenceOutcome, Option<CoherenceBreakdown>) {
    if windows.len() < 2 {
        return (
            CoherenceOutcome::Degenerate(Degeneracy::TooFewWindows {
                windows: windows.len(),
            }),
            None,
        );
    }

    let window_scores: Vec<f64> = windows.iter().filter_map(|w| w.avg_score).collect();
    if window_scores.len() < 2 {
        return (
            CoherenceOutcome::Degenerate(Degeneracy::TooFewScores {
                scores: window_scores.len(),
            }),
            None,
        );
    }
    let note_scores: Vec<f64> = windows.iter().flat_map(|w| w.scores()).collect();

    // Fewer than three window averages, or averages that never move, cannot
    // show reversals inside the windows; read direction from the notes then.
    let direction_scores = if window_scores.len() < 3 || is_flat(&window_scores) {
        &note_scores
    } else {
        &window_scores
    };

    let change_rate = direction_change_rate(direction_scores);
    let breakdown = CoherenceBreakdown {
        direction_consistency: direction_consistency(direction_scores),
        stability: 1.0 - change_rate,
        variance_coherence: variance_coherence(&note_scores, change_rate),
        observation_consistency: observation_consistency(windows),
    };

    let signals = [
        ("direction_consistency", breakdown.direction_consistency),
        ("stability", breakdown.stability),
        ("variance_coherence", breakdown.variance_coherence),
        ("observation_consistency", breakdown.observation_consistency),
    ];
    if let Some((name, _)) = signals.iter().find(|(_, v)| !v.is_finite()) {
        return (non_finite(name), Some(breakdown));
    }

    let blended = breakdown.direction_consistency * weights.direction_consistency
        + breakdown.stability * weights.stability
        + breakdown.variance_coherence * weights.variance_coherence
        + breakdown.observation_consistency * weights.observation_consistency;
    if !blended.is_finite() {
        return (non_finite("blend"), Some(breakdown));
    }

    (
        CoherenceOutcome::Valid {
            value: blended.clamp(0.0, 1.0),
        },
        Some(breakdown),
    )
}

fn non_finite(signal: &str) -> CoherenceOutcome {
    tracing::warn!(signal, "Non-finite coherence intermediate, using neutral fallback");
    CoherenceOutcome::Degenerate(Degeneracy::NonFinite {
        signal: signal.to_string(),
    })
}

fn sign(x: f64) -> i8 {
    if x > SIGN_EPSILON {
        1
    } else if x < -SIGN_EPSILON {
        -1
    } else {
        0
    }
}

fn is_flat(scores: &[f64]) -> bool {
    scores.windows(2).all(|pair| sign(pair[1] - pair[0]) == 0)
}

/// Fraction of consecutive deltas whose sign matches first-to-last trend
pub fn direction_consistency(scores: &[f64]) -> f64 {
    if scores.len() < 2 {
        return 1.0;
    }
    let trend = sign(scores[scores.len() - 1] - scores[0]);
    let deltas = scores.len() - 1;
    let matching = scores
        .windows(2)
        .filter(|pair| sign(pair[1] - pair[0]) == trend)
        .count();
    matching as f64 / deltas as f64
}

/// Direction reversals per reversal opportunity, in [0, 1]
///
/// Flat steps carry no direction and are skipped, so `1, 1, 2` has no
/// reversal while `1, 2, 1` has one.
pub fn direction_change_rate(scores: &[f64]) -> f64 {
    if scores.len() < 3 {
        return 0.0;
    }
    let signs: Vec<i8> = scores
        .windows(2)
        .map(|pair| sign(pair[1] - pair[0]))
        .filter(|s| *s != 0)
        .collect();
    let reversals = signs.windows(2).filter(|p| p[0] != p[1]).count();
    (reversals as f64 / (scores.len() - 2) as f64).clamp(0.0, 1.0)
}

/// Population variance of `values`
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// `1 - variance / max_variance`, scaled down by the direction-change rate
///
/// `max_variance = max((range / 2)^2, (mean * 0.5)^2, VARIANCE_FLOOR)`; the
/// floor keeps near-constant sequences from magnifying noise. Non-finite
/// input yields a non-finite result for the caller to classify.
pub fn variance_coherence(scores: &[f64], change_rate: f64) -> f64 {
    if scores.len() < 2 {
        return 1.0;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = population_variance(scores);
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let max_variance = (range / 2.0)
        .powi(2)
        .max((mean * 0.5).powi(2))
        .max(VARIANCE_FLOOR);
    let base = 1.0 - variance / max_variance;
    let penalised = base * (1.0 - change_rate * DIRECTION_CHANGE_PENALTY);
    if !penalised.is_finite() || !mean.is_finite() {
        return f64::NAN;
    }
    penalised.clamp(0.0, 1.0)
}

/// Mean keyword overlap between consecutive dominant observations
pub fn observation_consistency(windows: &[Window]) -> f64 {
    let keyword_sets: Vec<BTreeSet<String>> = windows
        .iter()
        .filter_map(|w| w.dominant_observation.as_deref())
        .map(keywords)
        .collect();
    if keyword_sets.len() < 2 {
        return 1.0;
    }

    let overlaps: Vec<f64> = keyword_sets
        .windows(2)
        .map(|pair| {
            let union = pair[0].union(&pair[1]).count();
            if union == 0 {
                1.0
            } else {
                pair[0].intersection(&pair[1]).count() as f64 / union as f64
            }
        })
        .collect();
    overlaps.iter().sum::<f64>() / overlaps.len() as f64
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}
