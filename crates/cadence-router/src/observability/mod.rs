//! Observability - routing counters for the Adaptive Processor

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::RefreshStats;
use crate::processor::Provenance;

#[derive(Debug, Default)]
pub struct ProcessorStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    light_recomputes: AtomicU64,
    full_recomputes: AtomicU64,
    background_refreshes: AtomicU64,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, provenance: Provenance) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let counter = match provenance {
            Provenance::Cache => &self.cache_hits,
            Provenance::RecomputedLight => &self.light_recomputes,
            Provenance::RecomputedFull => &self.full_recomputes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_refresh(&self) {
        self.background_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, refresh: RefreshStats) -> StatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        StatsSnapshot {
            requests,
            cache_hits,
            light_recomputes: self.light_recomputes.load(Ordering::Relaxed),
            full_recomputes: self.full_recomputes.load(Ordering::Relaxed),
            background_refreshes: self.background_refreshes.load(Ordering::Relaxed),
            cache_hit_rate: if requests > 0 {
                cache_hits as f64 / requests as f64
            } else {
                0.0
            },
            refresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub light_recomputes: u64,
    pub full_recomputes: u64,
    /// Background refreshes spawned
    pub background_refreshes: u64,
    pub cache_hit_rate: f64,
    pub refresh: RefreshStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = ProcessorStats::new();
        stats.record(Provenance::Cache);
        stats.record(Provenance::RecomputedLight);
        stats.record(Provenance::Cache);
        stats.record(Provenance::RecomputedFull);

        let snapshot = stats.snapshot(RefreshStats::default());
        assert_eq!(snapshot.requests, 4);
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_hit_rate, 0.5);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ProcessorStats::new().snapshot(RefreshStats::default());
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }
}
