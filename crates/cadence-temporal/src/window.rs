//! Fixed-size time windows over a note sequence

use cadence_core::{sorted_by_time, Note};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decay::decay_weight;

/// A time-bounded group of notes at one scale
///
/// Windows are derived on every pass and never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive start, in note time
    pub start_time: i64,
    /// Exclusive end
    pub end_time: i64,
    /// Notes in timestamp order
    pub notes: Vec<Note>,
    /// Recency weight, `decay ^ (age / window size)`
    pub weight: f64,
    /// Mean of the scores present, absent if no note was scored
    pub avg_score: Option<f64>,
    /// Most frequent observation text
    pub dominant_observation: Option<String>,
}

impl Window {
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.notes.iter().filter_map(|n| n.score)
    }

    pub fn scored_count(&self) -> usize {
        self.scores().count()
    }

    /// Last scored note minus first scored note, if at least two are scored
    pub fn trend(&self) -> Option<f64> {
        let mut scores = self.scores();
        let first = scores.next()?;
        let last = scores.last()?;
        Some(last - first)
    }
}

/// Partition notes into non-overlapping windows anchored at the earliest
/// timestamp. Empty windows are not emitted. `now` is the reference time
/// for recency weights.
pub fn partition(notes: &[Note], window_size_ms: u64, decay_factor: f64, now: i64) -> Vec<Window> {
    let sorted = sorted_by_time(notes);
    let Some(anchor) = sorted.first().map(|n| n.timestamp) else {
        return Vec::new();
    };
    let size = i64::try_from(window_size_ms.max(1)).unwrap_or(i64::MAX);

    let mut buckets: BTreeMap<i64, Vec<Note>> = BTreeMap::new();
    for note in sorted {
        let index = note.timestamp.saturating_sub(anchor) / size;
        buckets.entry(index).or_default().push(note.clone());
    }

    buckets
        .into_iter()
        .map(|(index, notes)| {
            let start_time = anchor.saturating_add(index.saturating_mul(size));
            let age = now.saturating_sub(start_time).max(0);
            let scores: Vec<f64> = notes.iter().filter_map(|n| n.score).collect();
            let avg_score = if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum::<f64>() / scores.len() as f64)
            };
            Window {
                start_time,
                end_time: start_time.saturating_add(size),
                weight: decay_weight(decay_factor, age, window_size_ms),
                avg_score,
                dominant_observation: dominant_observation(&notes),
                notes,
            }
        })
        .collect()
}

/// Most frequent non-empty observation; the earliest wins ties
fn dominant_observation(notes: &[Note]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for text in notes
        .iter()
        .filter_map(|n| n.observation.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        match counts.iter_mut().find(|(seen, _)| *seen == text) {
            Some((_, count)) => *count += 1,
            None => counts.push((text, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (text, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((text, count));
        }
    }
    best.map(|(text, _)| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_anchors_at_earliest() {
        let notes = vec![
            Note::scored(2_500, 4.0),
            Note::scored(1_000, 2.0),
            Note::scored(1_400, 6.0),
        ];
        let windows = partition(&notes, 1_000, 0.9, 2_500);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start_time, 1_000);
        assert_eq!(windows[0].end_time, 2_000);
        assert_eq!(windows[0].avg_score, Some(4.0));
        assert_eq!(windows[1].start_time, 2_000);
    }

    #[test]
    fn test_unscored_window_has_no_score() {
        let notes = vec![Note::new(0).with_observation("loading"), Note::scored(5_000, 8.0)];
        let windows = partition(&notes, 1_000, 0.9, 5_000);

        assert_eq!(windows[0].avg_score, None);
        assert_eq!(windows[1].avg_score, Some(8.0));
    }

    #[test]
    fn test_weights_decay_with_age() {
        let notes = vec![Note::scored(0, 1.0), Note::scored(2_000, 1.0)];
        let windows = partition(&notes, 1_000, 0.5, 2_000);

        assert!((windows[0].weight - 0.25).abs() < 1e-12);
        assert!((windows[1].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dominant_observation() {
        let notes = vec![
            Note::new(0).with_observation("menu opens"),
            Note::new(1).with_observation("menu flickers"),
            Note::new(2).with_observation("menu flickers"),
        ];
        let windows = partition(&notes, 1_000, 0.9, 2);
        assert_eq!(
            windows[0].dominant_observation.as_deref(),
            Some("menu flickers")
        );
    }

    #[test]
    fn test_window_trend() {
        let notes = vec![
            Note::scored(0, 3.0),
            Note::new(10),
            Note::scored(20, 7.0),
        ];
        let windows = partition(&notes, 1_000, 0.9, 20);
        assert_eq!(windows[0].trend(), Some(4.0));
        assert_eq!(windows[0].scored_count(), 2);
    }
}
