//! # Cadence Temporal
//!
//! Time-decayed, multi-resolution aggregation of observation notes.
//!
//! ## Features
//!
//! - Fixed, non-overlapping windows anchored at the earliest note
//! - Exponential recency decay without running state
//! - Coherence scoring that separates stable from erratic experiences
//! - Conflict detection between adjacent, well-populated windows
//! - Note pruning and prompt formatting for downstream consumers
//!
//! ## Quick Start
//!
//! ```rust
//! use cadence_core::{AggregationConfig, Note};
//! use cadence_temporal::{Aggregate, WindowedAggregator};
//!
//! let aggregator = WindowedAggregator::new(AggregationConfig::default()).unwrap();
//!
//! let notes: Vec<Note> = (0..20)
//!     .map(|i| Note::scored(i * 1_000, i as f64))
//!     .collect();
//!
//! let result = aggregator.aggregate(&notes, 10_000);
//! assert!(result.coherence > 0.8);
//! println!("{}", result.summary);
//! ```
//!
//! ## Default Scales
//!
//! | Scale | Window |
//! |-------|--------|
//! | immediate | 100ms |
//! | short | 1s |
//! | medium | 5s |
//! | long | 30s |

pub mod aggregator;
pub mod coherence;
pub mod decay;
pub mod decision;
pub mod pruner;
pub mod window;

pub use aggregator::{Aggregate, AggregationResult, Conflict, MultiScaleResult, WindowedAggregator};
pub use coherence::{CoherenceBreakdown, CoherenceOutcome, Degeneracy};
pub use decision::{compare_quality, format_for_prompt, Preference};
pub use pruner::{select_top_weighted, NotePruner};
pub use window::Window;
