//! Adaptive Processor - routes summary requests to cache or recompute
//!
//! Routing, in priority order:
//!
//! 1. HIGH activity with a fresh cache entry: serve the cache, no aggregation.
//! 2. LOW activity on a stable stream: full multi-scale refresh, cache updated.
//! 3. Anything else: primary-scale aggregation only, cache untouched. A
//!    background refresh is scheduled when activity is LOW, or MEDIUM with a
//!    stale cache.
//!
//! A corrupted cache entry is the one exception to "no refresh during HIGH":
//! it schedules a background refresh at any activity level, since there is
//! nothing left to serve until one completes. The request itself still gets
//! the light recompute, so the interactive path never waits on it.
//!
//! Bursts are served from work done while the stream was idle, trading up
//! to `max_cache_age_ms` of staleness for a bounded interactive path.

use cadence_core::{AggregationConfig, Clock, ConfigError, Note, NoteStore, SystemClock};
use cadence_temporal::{Aggregate, AggregationResult, MultiScaleResult, WindowedAggregator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::activity::{ActivityClassifier, ActivityLevel, ActivityReport};
use crate::cache::{CacheEntry, CacheManager, CacheValidity};
use crate::observability::{ProcessorStats, StatsSnapshot};

/// Where a returned result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Cache,
    RecomputedLight,
    RecomputedFull,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cache => "cache",
            Self::RecomputedLight => "recomputed-light",
            Self::RecomputedFull => "recomputed-full",
        };
        f.write_str(name)
    }
}

/// A routed, provenance-tagged result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub result: AggregationResult,
    /// Present when the result came from a multi-scale pass
    pub multi_scale: Option<MultiScaleResult>,
    pub provenance: Provenance,
    pub activity: ActivityReport,
    /// Why this route was taken
    pub reason: String,
}

impl ProcessOutcome {
    fn from_entry(
        entry: &CacheEntry,
        provenance: Provenance,
        activity: ActivityReport,
        reason: String,
    ) -> Self {
        Self {
            result: entry.result.clone(),
            multi_scale: Some(entry.multi_scale.clone()),
            provenance,
            activity,
            reason,
        }
    }
}

/// Whether a cache refresh may run at this activity level
pub fn refresh_allowed(level: ActivityLevel, cache_fresh: bool) -> bool {
    match level {
        ActivityLevel::Low => true,
        ActivityLevel::Medium => !cache_fresh,
        ActivityLevel::High => false,
    }
}

/// Sole entry point for summary requests on one stream
#[derive(Debug)]
pub struct AdaptiveProcessor<A: Aggregate + 'static = WindowedAggregator> {
    config: AggregationConfig,
    aggregator: Arc<A>,
    cache: Arc<CacheManager<A>>,
    classifier: ActivityClassifier,
    stats: ProcessorStats,
}

impl AdaptiveProcessor<WindowedAggregator> {
    /// Processor with the windowed aggregator and the system clock
    pub fn new(config: AggregationConfig) -> Result<Self, ConfigError> {
        let aggregator = WindowedAggregator::new(config.clone())?;
        Self::with_parts(config, Arc::new(aggregator), Arc::new(SystemClock))
    }
}

impl<A: Aggregate + 'static> AdaptiveProcessor<A> {
    /// Processor with a caller-supplied aggregator and clock
    pub fn with_parts(
        config: AggregationConfig,
        aggregator: Arc<A>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = Arc::new(CacheManager::new(
            Arc::clone(&aggregator),
            clock,
            config.max_note_delta,
        ));
        Ok(Self {
            classifier: ActivityClassifier::from_config(&config),
            config,
            aggregator,
            cache,
            stats: ProcessorStats::new(),
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager<A>> {
        &self.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.cache.stats())
    }

    /// Classify activity and route
    pub fn process(&self, notes: &[Note]) -> ProcessOutcome {
        let activity = self.classifier.classify(notes);
        self.route(notes, activity)
    }

    /// Process a snapshot of the store
    pub fn process_store(&self, store: &NoteStore) -> ProcessOutcome {
        self.process(&store.snapshot())
    }

    /// Route with an already-computed activity report
    pub fn route(&self, notes: &[Note], activity: ActivityReport) -> ProcessOutcome {
        let live = notes.len();
        let max_age = self.config.max_cache_age_ms;
        let lookup = self.cache.lookup(max_age, live);
        let corrupted = matches!(lookup, Err(CacheValidity::Corrupted(_)));
        let fresh = lookup.ok();

        let outcome = match (activity.level, fresh) {
            (ActivityLevel::High, Some(entry)) => ProcessOutcome::from_entry(
                &entry,
                Provenance::Cache,
                activity,
                "high activity, fresh cache".to_string(),
            ),
            (ActivityLevel::Low, _) if activity.is_stable => {
                match self.cache.refresh(notes, &self.config) {
                    Some(entry) => ProcessOutcome::from_entry(
                        &entry,
                        Provenance::RecomputedFull,
                        activity,
                        "low activity, stable stream".to_string(),
                    ),
                    None => self.light(notes, activity, "full refresh already in flight"),
                }
            }
            (level, fresh) => {
                let cache_fresh = fresh.is_some();
                let reason = if level == ActivityLevel::High {
                    "high activity, cache unavailable"
                } else {
                    "interactive recompute"
                };
                let outcome = self.light(notes, activity, reason);
                if corrupted || refresh_allowed(level, cache_fresh) {
                    self.schedule_refresh(notes);
                }
                outcome
            }
        };

        self.stats.record(outcome.provenance);
        tracing::debug!(
            provenance = %outcome.provenance,
            activity = %outcome.activity.level,
            note_count = live,
            reason = %outcome.reason,
            "Routed summary request"
        );
        outcome
    }

    /// Release the stream: in-flight refreshes are discarded
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    fn light(&self, notes: &[Note], activity: ActivityReport, reason: &str) -> ProcessOutcome {
        ProcessOutcome {
            result: self.aggregator.aggregate(notes, self.config.primary_window_ms()),
            multi_scale: None,
            provenance: Provenance::RecomputedLight,
            activity,
            reason: reason.to_string(),
        }
    }

    fn schedule_refresh(&self, notes: &[Note]) {
        if self.cache.is_refreshing() || self.cache.is_closed() {
            return;
        }
        if self
            .cache
            .spawn_refresh(notes.to_vec(), self.config.clone())
            .is_some()
        {
            self.stats.record_background_refresh();
        }
    }
}
