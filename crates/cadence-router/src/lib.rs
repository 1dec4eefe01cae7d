//! Cadence Router - activity-aware summary routing
//!
//! Decides, per request, whether a stream's summary is served from the
//! preprocessing cache, recomputed at the primary scale only, or recomputed
//! at every scale and cached.
//!
//! ## Quick Start
//!
//! ```rust
//! use cadence_core::{AggregationConfig, Note};
//! use cadence_router::{AdaptiveProcessor, Provenance};
//!
//! let processor = AdaptiveProcessor::new(AggregationConfig::default()).unwrap();
//!
//! // A quiet, steady stream gets a full multi-scale pass
//! let notes: Vec<Note> = (0..5).map(|i| Note::scored(i * 2_000, 7.0)).collect();
//! let outcome = processor.process(&notes);
//!
//! assert_eq!(outcome.provenance, Provenance::RecomputedFull);
//! println!("{}", outcome.result.summary);
//! ```

pub mod activity;
pub mod cache;
pub mod observability;
pub mod processor;

pub use activity::{ActivityClassifier, ActivityLevel, ActivityReport};
pub use cache::{CacheEntry, CacheManager, CacheValidity, RefreshStats};
pub use observability::{ProcessorStats, StatsSnapshot};
pub use processor::{AdaptiveProcessor, ProcessOutcome, Provenance};
