//! Property tests for aggregation invariants

use cadence_core::{AggregationConfig, Note};
use cadence_temporal::{Aggregate, WindowedAggregator};
use proptest::prelude::*;

fn arb_score() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        3 => (0.0f64..=10.0).prop_map(Some),
        1 => Just(None),
        1 => prop_oneof![
            Just(f64::NAN),
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
            Just(f64::MAX),
            Just(-1e300),
        ]
        .prop_map(Some),
    ]
}

fn arb_notes(scores: impl Strategy<Value = Option<f64>>) -> impl Strategy<Value = Vec<Note>> {
    prop::collection::vec((0i64..5_000, scores), 0..60).prop_map(|items| {
        let mut ts = 0;
        items
            .into_iter()
            .map(|(gap, score)| {
                ts += gap;
                let mut note = Note::new(ts);
                note.score = score;
                note
            })
            .collect()
    })
}

fn aggregator(decay: f64) -> WindowedAggregator {
    WindowedAggregator::new(AggregationConfig::default().with_decay_factor(decay)).unwrap()
}

proptest! {
    #[test]
    fn coherence_always_in_unit_interval(
        notes in arb_notes(arb_score()),
        window in 1u64..20_000,
        decay in 0.01f64..=1.0,
    ) {
        let result = aggregator(decay).aggregate(&notes, window);
        prop_assert!((0.0..=1.0).contains(&result.coherence));
    }

    #[test]
    fn at_most_one_score_means_full_coherence(
        notes in arb_notes(Just(None)),
        score in 0.0f64..=10.0,
        window in 1u64..20_000,
    ) {
        let mut notes = notes;
        if let Some(first) = notes.first_mut() {
            first.score = Some(score);
        }
        let result = aggregator(0.9).aggregate(&notes, window);
        prop_assert_eq!(result.coherence, 1.0);
    }

    #[test]
    fn windows_are_ordered(
        notes in arb_notes(arb_score()),
        window in 1u64..20_000,
    ) {
        let result = aggregator(0.9).aggregate(&notes, window);
        for pair in result.windows.windows(2) {
            prop_assert!(pair[0].start_time <= pair[1].start_time);
        }
        let total: usize = result.windows.iter().map(|w| w.notes.len()).sum();
        prop_assert_eq!(total, notes.len());
    }

    #[test]
    fn aggregation_is_idempotent(
        notes in arb_notes((0.0f64..=10.0).prop_map(Some)),
        window in 1u64..20_000,
    ) {
        let aggregator = aggregator(0.9);
        let first = aggregator.aggregate(&notes, window);
        let second = aggregator.aggregate(&notes, window);
        prop_assert_eq!(first, second);
    }
}
