//! Decision helpers for downstream consumers
//!
//! Nothing here judges correctness. These helpers only compare aggregated
//! results and render them as bounded text a caller may embed in a prompt.

use cadence_core::config::EQUIVOCAL_QUALITY_GAP;
use cadence_core::Note;
use serde::{Deserialize, Serialize};

use crate::aggregator::{truncate_chars, AggregationResult};

/// Upper bound on [`format_for_prompt`] output, in characters
pub const MAX_PROMPT_CHARS: usize = 2_000;
const MAX_NOTE_LINE_CHARS: usize = 160;

/// Which of two results reads better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    First,
    Second,
    /// Gap below the equivocal threshold, or a side without scores
    Equivocal,
}

/// Compare weighted scores with the default equivocal gap
pub fn compare_quality(a: &AggregationResult, b: &AggregationResult) -> Preference {
    compare_quality_with_gap(a, b, EQUIVOCAL_QUALITY_GAP)
}

pub fn compare_quality_with_gap(
    a: &AggregationResult,
    b: &AggregationResult,
    gap: f64,
) -> Preference {
    match (a.weighted_score, b.weighted_score) {
        (Some(sa), Some(sb)) if (sa - sb).abs() >= gap => {
            if sa > sb {
                Preference::First
            } else {
                Preference::Second
            }
        }
        _ => Preference::Equivocal,
    }
}

/// Render a result and selected notes as a bounded prompt block
///
/// Pair with [`crate::pruner::select_top_weighted`] to bound the notes.
pub fn format_for_prompt(result: &AggregationResult, notes: &[&Note]) -> String {
    let mut out = String::new();
    out.push_str("TEMPORAL SUMMARY:\n");
    out.push_str(&result.summary);
    out.push('\n');

    if !result.conflicts.is_empty() {
        out.push_str("\nCONFLICTS:\n");
        for conflict in &result.conflicts {
            out.push_str("- ");
            out.push_str(&conflict.reason);
            out.push('\n');
        }
    }

    if !notes.is_empty() {
        out.push_str("\nKEY NOTES:\n");
        for note in notes {
            let score = note
                .score
                .map_or_else(|| "-".to_string(), |s| format!("{:.1}", s));
            let line = format!(
                "[{}ms] score {}: {}",
                note.timestamp,
                score,
                note.observation.as_deref().unwrap_or("(no observation)")
            );
            out.push_str("- ");
            out.push_str(&truncate_chars(&line, MAX_NOTE_LINE_CHARS));
            out.push('\n');
        }
    }

    truncate_chars(&out, MAX_PROMPT_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Aggregate, WindowedAggregator};
    use cadence_core::AggregationConfig;

    fn result_with_score(score: f64) -> AggregationResult {
        let aggregator = WindowedAggregator::new(AggregationConfig::default()).unwrap();
        aggregator.aggregate(&[Note::scored(0, score)], 1_000)
    }

    #[test]
    fn test_clear_preference() {
        assert_eq!(
            compare_quality(&result_with_score(8.0), &result_with_score(6.0)),
            Preference::First
        );
        assert_eq!(
            compare_quality(&result_with_score(6.0), &result_with_score(8.0)),
            Preference::Second
        );
    }

    #[test]
    fn test_small_gap_is_equivocal() {
        assert_eq!(
            compare_quality(&result_with_score(7.0), &result_with_score(7.3)),
            Preference::Equivocal
        );
    }

    #[test]
    fn test_missing_score_is_equivocal() {
        let unscored = AggregationResult::empty(1_000);
        assert_eq!(
            compare_quality(&unscored, &result_with_score(9.0)),
            Preference::Equivocal
        );
    }

    #[test]
    fn test_prompt_is_bounded() {
        let result = result_with_score(5.0);
        let long = "y".repeat(500);
        let notes: Vec<Note> = (0..100)
            .map(|i| Note::scored(i, 5.0).with_observation(&long))
            .collect();
        let refs: Vec<&Note> = notes.iter().collect();
        let prompt = format_for_prompt(&result, &refs);

        assert!(prompt.starts_with("TEMPORAL SUMMARY:"));
        assert!(prompt.chars().count() <= MAX_PROMPT_CHARS);
    }
}
