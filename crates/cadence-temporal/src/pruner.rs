//! Note pruning
//!
//! Bounds how many notes are forwarded to prompt construction by ranking
//! them on recency, salience and proximity to user interaction.

use cadence_core::{AggregationConfig, Note};
use std::cmp::Ordering;

use crate::decay::decay_weight;

/// Weight of the recency term
pub const RECENCY_WEIGHT: f64 = 1.0;
/// Bonus for notes tagged unusual or critical
pub const SALIENCE_WEIGHT: f64 = 0.5;
/// Bonus for notes at or near an interaction
pub const INTERACTION_WEIGHT: f64 = 0.3;
/// How close to an interaction a note must be to count as coinciding
pub const INTERACTION_COINCIDENCE_MS: i64 = 1_000;

/// Ranking parameters
#[derive(Debug, Clone)]
pub struct NotePruner {
    pub decay_factor: f64,
    /// Age unit for the recency decay
    pub decay_unit_ms: u64,
    pub recency_weight: f64,
    pub salience_weight: f64,
    pub interaction_weight: f64,
    pub coincidence_ms: i64,
}

impl Default for NotePruner {
    fn default() -> Self {
        Self::from_config(&AggregationConfig::default())
    }
}

impl NotePruner {
    /// Use the configuration's decay factor and window size
    pub fn from_config(config: &AggregationConfig) -> Self {
        Self {
            decay_factor: config.decay_factor,
            decay_unit_ms: config.window_size_ms,
            recency_weight: RECENCY_WEIGHT,
            salience_weight: SALIENCE_WEIGHT,
            interaction_weight: INTERACTION_WEIGHT,
            coincidence_ms: INTERACTION_COINCIDENCE_MS,
        }
    }

    /// Notes paired with their combined weight, highest first
    pub fn rank<'a>(&self, notes: &'a [Note]) -> Vec<(&'a Note, f64)> {
        let Some(now) = notes.iter().map(|n| n.timestamp).max() else {
            return Vec::new();
        };
        let mut interactions: Vec<i64> = notes
            .iter()
            .filter(|n| n.is_interaction())
            .map(|n| n.timestamp)
            .collect();
        interactions.sort_unstable();

        let mut ranked: Vec<(&Note, f64)> = notes
            .iter()
            .map(|note| {
                let age = now.saturating_sub(note.timestamp);
                let recency = decay_weight(self.decay_factor, age, self.decay_unit_ms);
                let salience = if note.is_salient() { 1.0 } else { 0.0 };
                let coincidence = if coincides(&interactions, note.timestamp, self.coincidence_ms) {
                    1.0
                } else {
                    0.0
                };
                let weight = recency * self.recency_weight
                    + salience * self.salience_weight
                    + coincidence * self.interaction_weight;
                (note, weight)
            })
            .collect();

        ranked.sort_by(|(a, wa), (b, wb)| {
            wb.partial_cmp(wa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        ranked
    }

    /// The `top_n` highest-weighted notes; ties go to the more recent note
    pub fn select_top_weighted<'a>(&self, notes: &'a [Note], top_n: usize) -> Vec<&'a Note> {
        self.rank(notes)
            .into_iter()
            .take(top_n)
            .map(|(note, _)| note)
            .collect()
    }
}

/// [`NotePruner::select_top_weighted`] with default weights
pub fn select_top_weighted(notes: &[Note], top_n: usize) -> Vec<&Note> {
    NotePruner::default().select_top_weighted(notes, top_n)
}

fn coincides(sorted_interactions: &[i64], timestamp: i64, within_ms: i64) -> bool {
    let idx = sorted_interactions.partition_point(|t| *t < timestamp);
    let after = sorted_interactions.get(idx);
    let before = idx.checked_sub(1).and_then(|i| sorted_interactions.get(i));
    after.map_or(false, |t| t.saturating_sub(timestamp) <= within_ms)
        || before.map_or(false, |t| timestamp.saturating_sub(*t) <= within_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{TAG_CRITICAL, TAG_INTERACTION};

    #[test]
    fn test_recent_notes_win_by_default() {
        let notes: Vec<Note> = (0..5).map(|i| Note::scored(i * 10_000, 5.0)).collect();
        let top = select_top_weighted(&notes, 2);
        assert_eq!(top[0].timestamp, 40_000);
        assert_eq!(top[1].timestamp, 30_000);
    }

    #[test]
    fn test_salient_note_outranks_recency() {
        let notes = vec![
            Note::scored(0, 5.0).with_tag(TAG_CRITICAL),
            Note::scored(10_000, 5.0),
        ];
        let top = select_top_weighted(&notes, 1);
        assert_eq!(top[0].timestamp, 0);
    }

    #[test]
    fn test_interaction_coincidence() {
        let notes = vec![
            Note::new(0).with_tag(TAG_INTERACTION),
            Note::new(500),
            Note::new(5_000),
        ];
        let interactions = vec![0];
        assert!(coincides(&interactions, 500, 1_000));
        assert!(!coincides(&interactions, 5_000, 1_000));

        let ranked = NotePruner::default().rank(&notes);
        let weight_of = |ts: i64| ranked.iter().find(|(n, _)| n.timestamp == ts).unwrap().1;
        assert!(weight_of(500) > weight_of(5_000));
    }

    #[test]
    fn test_ties_broken_by_recency() {
        let pruner = NotePruner {
            decay_factor: 1.0,
            ..NotePruner::default()
        };
        let notes = vec![Note::new(100), Note::new(300), Note::new(200)];
        let top = pruner.select_top_weighted(&notes, 3);
        let order: Vec<i64> = top.iter().map(|n| n.timestamp).collect();
        assert_eq!(order, vec![300, 200, 100]);
    }

    #[test]
    fn test_empty_and_oversized_top_n() {
        assert!(select_top_weighted(&[], 5).is_empty());
        let notes = vec![Note::new(1)];
        assert_eq!(select_top_weighted(&notes, 10).len(), 1);
    }
}
