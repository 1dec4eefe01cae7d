//! Observation notes and the append-only note store
//!
//! A [`Note`] is one timestamped observation captured while an agent
//! interacts with a visual interface. Notes are immutable once appended;
//! the [`NoteStore`] only ever grows.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Tag marking a note produced by direct user interaction
pub const TAG_INTERACTION: &str = "interaction";
/// Tag marking an unusual observation
pub const TAG_UNUSUAL: &str = "unusual";
/// Tag marking a critical observation
pub const TAG_CRITICAL: &str = "critical";

/// A single timestamped observation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Milliseconds, monotonic per stream
    pub timestamp: i64,
    /// Score in 0-10, if the observation was scored
    #[serde(default)]
    pub score: Option<f64>,
    /// Short observation text
    #[serde(default)]
    pub observation: Option<String>,
    /// Free-form tags (see [`TAG_INTERACTION`], [`TAG_UNUSUAL`], [`TAG_CRITICAL`])
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Opaque capture payload, never inspected by the engine
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Note {
    /// Create an unscored note at the given timestamp
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            score: None,
            observation: None,
            tags: BTreeSet::new(),
            raw: serde_json::Value::Null,
        }
    }

    /// Create a scored note
    pub fn scored(timestamp: i64, score: f64) -> Self {
        Self::new(timestamp).with_score(score)
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_observation(mut self, observation: &str) -> Self {
        self.observation = Some(observation.to_string());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Whether this note came from direct interaction
    pub fn is_interaction(&self) -> bool {
        self.has_tag(TAG_INTERACTION)
    }

    /// Whether this note is tagged unusual or critical
    pub fn is_salient(&self) -> bool {
        self.has_tag(TAG_UNUSUAL) || self.has_tag(TAG_CRITICAL)
    }
}

/// Append-only, time-ordered sequence of notes for one stream
///
/// One producer appends; any number of readers take snapshots. A snapshot
/// shares the current vector. An append copies it only while some snapshot
/// still holds it, so aggregation over a snapshot never blocks the producer.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: RwLock<Arc<Vec<Note>>>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-captured notes
    pub fn from_notes(notes: Vec<Note>) -> Self {
        Self {
            notes: RwLock::new(Arc::new(notes)),
        }
    }

    /// Append a note. Minor out-of-order arrival is accepted; consumers re-sort.
    pub fn append(&self, note: Note) {
        let mut guard = self.notes.write();
        let notes = Arc::make_mut(&mut *guard);
        if let Some(last) = notes.last() {
            if note.timestamp < last.timestamp {
                tracing::debug!(
                    timestamp = note.timestamp,
                    last_timestamp = last.timestamp,
                    "Out-of-order note appended"
                );
            }
        }
        notes.push(note);
    }

    /// Append several notes in order
    pub fn extend<I: IntoIterator<Item = Note>>(&self, notes: I) {
        for note in notes {
            self.append(note);
        }
    }

    /// The notes as of this call; later appends are not visible
    pub fn snapshot(&self) -> Arc<Vec<Note>> {
        Arc::clone(&self.notes.read())
    }

    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }

    /// Largest timestamp seen so far
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.notes.read().iter().map(|n| n.timestamp).max()
    }
}

/// Sort notes by timestamp, keeping arrival order for equal timestamps
pub fn sorted_by_time(notes: &[Note]) -> Vec<&Note> {
    let mut sorted: Vec<&Note> = notes.iter().collect();
    sorted.sort_by_key(|n| n.timestamp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_builders() {
        let note = Note::scored(1000, 7.5)
            .with_observation("Button is responsive")
            .with_tag(TAG_INTERACTION);

        assert_eq!(note.timestamp, 1000);
        assert_eq!(note.score, Some(7.5));
        assert!(note.is_interaction());
        assert!(!note.is_salient());
    }

    #[test]
    fn test_salient_tags() {
        assert!(Note::new(0).with_tag(TAG_UNUSUAL).is_salient());
        assert!(Note::new(0).with_tag(TAG_CRITICAL).is_salient());
    }

    #[test]
    fn test_store_snapshot_is_detached() {
        let store = NoteStore::new();
        store.append(Note::scored(0, 5.0));
        let snapshot = store.snapshot();
        store.append(Note::scored(10, 6.0));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0], Note::scored(0, 5.0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest_timestamp(), Some(10));
    }

    #[test]
    fn test_snapshots_share_until_append() {
        let store = NoteStore::from_notes(vec![Note::scored(0, 5.0)]);
        let first = store.snapshot();
        let second = store.snapshot();
        assert!(Arc::ptr_eq(&first, &second));

        store.append(Note::scored(10, 6.0));
        let third = store.snapshot();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first.len(), 1);
        assert_eq!(third.len(), 2);

        // No snapshot alive: the append reuses the vector in place
        drop((first, second, third));
        let before = Arc::as_ptr(&store.snapshot());
        store.append(Note::scored(20, 7.0));
        assert_eq!(Arc::as_ptr(&store.snapshot()), before);
    }

    #[test]
    fn test_sorted_by_time_is_stable() {
        let notes = vec![
            Note::scored(20, 1.0),
            Note::scored(10, 2.0),
            Note::scored(10, 3.0),
        ];
        let sorted = sorted_by_time(&notes);
        let scores: Vec<_> = sorted.iter().map(|n| n.score.unwrap()).collect();
        assert_eq!(scores, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_note_deserializes_with_missing_fields() {
        let note: Note = serde_json::from_str(r#"{"timestamp": 42}"#).unwrap();
        assert_eq!(note.timestamp, 42);
        assert!(note.score.is_none());
        assert!(note.tags.is_empty());
    }
}
