//! # Cadence Core
//!
//! Core types for Cadence:
//! - [`Note`] - Timestamped observation record
//! - [`NoteStore`] - Append-only, snapshot-readable note sequence
//! - [`AggregationConfig`] - Validated aggregation, cache and routing settings
//! - [`Clock`] - Millisecond time source used to age cached results

pub mod clock;
pub mod config;
pub mod note;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AggregationConfig, CoherenceWeights, ConfigError};
pub use note::{sorted_by_time, Note, NoteStore, TAG_CRITICAL, TAG_INTERACTION, TAG_UNUSUAL};
