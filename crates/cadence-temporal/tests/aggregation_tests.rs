//! Scenario tests for windowed aggregation

use cadence_core::{AggregationConfig, Note};
use cadence_temporal::{
    format_for_prompt, select_top_weighted, Aggregate, CoherenceOutcome, Degeneracy,
    WindowedAggregator,
};

fn aggregator() -> WindowedAggregator {
    WindowedAggregator::new(AggregationConfig::default().with_decay_factor(0.9)).unwrap()
}

#[test]
fn test_increasing_scores_are_coherent() {
    let notes: Vec<Note> = (0..20).map(|i| Note::scored(i * 1_000, i as f64)).collect();

    let result = aggregator().aggregate(&notes, 10_000);
    let breakdown = result.breakdown.expect("two scored windows");

    assert!((breakdown.direction_consistency - 1.0).abs() < 1e-9);
    assert!(result.coherence > 0.8, "coherence was {}", result.coherence);
    assert!(result.coherence_outcome.is_valid());
}

#[test]
fn test_alternating_scores_are_erratic() {
    let notes: Vec<Note> = (0..20)
        .map(|i| Note::scored(i * 1_000, if i % 2 == 0 { 0.0 } else { 10.0 }))
        .collect();

    let result = aggregator().aggregate(&notes, 1_000);
    let breakdown = result.breakdown.expect("twenty scored windows");

    assert!(breakdown.stability < 0.05, "stability was {}", breakdown.stability);
    assert!(result.coherence < 0.4, "coherence was {}", result.coherence);
    assert!(result.summary.contains("erratic"));
}

#[test]
fn test_alternating_scores_are_erratic_at_default_window() {
    let notes: Vec<Note> = (0..20)
        .map(|i| Note::scored(i * 1_000, if i % 2 == 0 { 0.0 } else { 10.0 }))
        .collect();

    let result = aggregator().aggregate_default(&notes);
    assert_eq!(result.window_size_ms, 10_000);
    assert_eq!(result.windows.len(), 2);

    let breakdown = result.breakdown.expect("two scored windows");
    assert_eq!(breakdown.stability, 0.0);
    assert!(result.coherence < 0.4, "coherence was {}", result.coherence);
    assert!(result.summary.contains("erratic"));
}

#[test]
fn test_extreme_timestamps_do_not_panic() {
    let notes = vec![
        Note::scored(i64::MIN, 1.0),
        Note::scored(0, 5.0),
        Note::scored(i64::MAX, 9.0).with_tag(cadence_core::TAG_INTERACTION),
    ];

    let result = aggregator().aggregate(&notes, 10_000);
    assert_eq!(result.note_count, 3);
    assert!((0.0..=1.0).contains(&result.coherence));
    assert_eq!(select_top_weighted(&notes, 2).len(), 2);
}

#[test]
fn test_empty_sequence() {
    let result = aggregator().aggregate(&[], 10_000);

    assert!(result.windows.is_empty());
    assert!(result.conflicts.is_empty());
    assert_eq!(result.coherence, 1.0);
}

#[test]
fn test_single_scored_note_among_many() {
    let mut notes: Vec<Note> = (0..5).map(|i| Note::new(i * 2_000)).collect();
    notes.push(Note::scored(11_000, 7.0));

    let result = aggregator().aggregate(&notes, 1_000);

    assert_eq!(result.coherence, 1.0);
    assert_eq!(
        result.coherence_outcome,
        CoherenceOutcome::Degenerate(Degeneracy::TooFewScores { scores: 1 })
    );
}

#[test]
fn test_out_of_order_arrival_is_resorted() {
    let ordered: Vec<Note> = (0..6).map(|i| Note::scored(i * 500, i as f64)).collect();
    let mut shuffled = ordered.clone();
    shuffled.swap(1, 4);
    shuffled.swap(0, 5);

    let a = aggregator().aggregate(&ordered, 1_000);
    let b = aggregator().aggregate(&shuffled, 1_000);

    assert_eq!(a, b);
}

#[test]
fn test_observation_drift_lowers_coherence() {
    let same: Vec<Note> = (0..6)
        .map(|i| {
            Note::scored(i * 1_000, 5.0 + i as f64 * 0.1).with_observation("menu renders cleanly")
        })
        .collect();
    let drifting: Vec<Note> = ["menu renders cleanly", "layout jumps around", "colors clash badly"]
        .iter()
        .cycle()
        .take(6)
        .enumerate()
        .map(|(i, obs)| Note::scored(i as i64 * 1_000, 5.0 + i as f64 * 0.1).with_observation(obs))
        .collect();

    let stable = aggregator().aggregate(&same, 1_000);
    let unstable = aggregator().aggregate(&drifting, 1_000);

    assert_eq!(stable.breakdown.unwrap().observation_consistency, 1.0);
    assert_eq!(unstable.breakdown.unwrap().observation_consistency, 0.0);
    assert!(stable.coherence > unstable.coherence);
}

#[test]
fn test_pruned_notes_feed_prompt() {
    let notes: Vec<Note> = (0..50)
        .map(|i| Note::scored(i * 200, 6.0).with_observation("scroll is smooth"))
        .collect();
    let result = aggregator().aggregate(&notes, 1_000);
    let top = select_top_weighted(&notes, 5);
    let prompt = format_for_prompt(&result, &top);

    assert_eq!(top.len(), 5);
    assert_eq!(prompt.matches("[").count(), 5);
    assert!(prompt.contains("[9800ms]"));
}

#[test]
fn test_result_serializes() {
    let notes = vec![Note::scored(0, 4.0), Note::scored(1_500, 6.0)];
    let result = aggregator().aggregate(&notes, 1_000);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["windows"].as_array().unwrap().len(), 2);
    assert_eq!(json["coherence_outcome"]["kind"], "valid");
}
