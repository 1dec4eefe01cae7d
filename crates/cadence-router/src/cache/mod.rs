//! Preprocessing Cache - one aggregated result per stream, swapped whole
//!
//! The [`CacheManager`] owns a single [`CacheEntry`]. Refreshes build a new
//! entry off to the side and install it with one pointer swap, so readers
//! always see either the old entry or the new one. At most one refresh runs
//! at a time; a second request while one is in flight is dropped.

use cadence_core::config::PRIMARY_SCALE;
use cadence_core::{AggregationConfig, Clock, Note};
use cadence_temporal::{Aggregate, AggregationResult, MultiScaleResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A cached aggregation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Primary-scale result served on cache hits
    pub result: AggregationResult,
    /// Every configured scale
    pub multi_scale: MultiScaleResult,
    /// Clock time the entry was computed at
    pub computed_at: i64,
    /// Live note count the entry was computed from
    pub source_note_count: usize,
}

/// Why an entry may or may not be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValidity {
    Fresh,
    Missing,
    /// Older than the maximum age
    Expired { age_ms: i64 },
    /// Too many notes arrived since it was computed
    VolumeStale { new_notes: usize },
    /// Entry contradicts the live state; treated as a miss
    Corrupted(String),
}

impl CacheValidity {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// Refresh counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub completed: u64,
    pub coalesced: u64,
    pub discarded: u64,
}

/// Clears the in-flight flag when the refresh ends, however it ends
struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Owner of a stream's single cache entry
#[derive(Debug)]
pub struct CacheManager<A: Aggregate> {
    aggregator: Arc<A>,
    clock: Arc<dyn Clock>,
    max_note_delta: usize,
    entry: RwLock<Option<Arc<CacheEntry>>>,
    refreshing: Arc<AtomicBool>,
    closed: AtomicBool,
    completed: AtomicU64,
    coalesced: AtomicU64,
    discarded: AtomicU64,
}

impl<A: Aggregate> CacheManager<A> {
    pub fn new(aggregator: Arc<A>, clock: Arc<dyn Clock>, max_note_delta: usize) -> Self {
        Self {
            aggregator,
            clock,
            max_note_delta,
            entry: RwLock::new(None),
            refreshing: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Current entry, valid or not
    pub fn get(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().clone()
    }

    /// Classify an entry against the live store
    pub fn validity_of(
        &self,
        entry: &CacheEntry,
        max_age_ms: u64,
        live_note_count: usize,
    ) -> CacheValidity {
        let Some(age_ms) = self.clock.now_ms().checked_sub(entry.computed_at) else {
            return CacheValidity::Corrupted(format!(
                "unrepresentable age for computed_at {}",
                entry.computed_at
            ));
        };
        if age_ms < 0 {
            return CacheValidity::Corrupted(format!(
                "computed {}ms in the future",
                age_ms.unsigned_abs()
            ));
        }
        if entry.source_note_count > live_note_count {
            return CacheValidity::Corrupted(format!(
                "computed from {} notes but the store holds {}",
                entry.source_note_count, live_note_count
            ));
        }
        if !(0.0..=1.0).contains(&entry.result.coherence) {
            return CacheValidity::Corrupted(format!(
                "coherence {} out of range",
                entry.result.coherence
            ));
        }
        if age_ms >= i64::try_from(max_age_ms).unwrap_or(i64::MAX) {
            return CacheValidity::Expired { age_ms };
        }
        let new_notes = live_note_count - entry.source_note_count;
        if new_notes > self.max_note_delta {
            return CacheValidity::VolumeStale { new_notes };
        }
        CacheValidity::Fresh
    }

    /// Validity of the current entry
    pub fn validity(&self, max_age_ms: u64, live_note_count: usize) -> CacheValidity {
        match self.get() {
            Some(entry) => self.validity_of(&entry, max_age_ms, live_note_count),
            None => CacheValidity::Missing,
        }
    }

    /// True only if the entry is younger than `max_age_ms` and fewer than
    /// `max_note_delta` notes have arrived since
    pub fn is_valid(&self, max_age_ms: u64, live_note_count: usize) -> bool {
        self.validity(max_age_ms, live_note_count).is_fresh()
    }

    /// The current entry if it may be served, otherwise why not
    ///
    /// A corrupted entry is logged and dropped, unless a refresh has
    /// replaced it in the meantime.
    pub fn lookup(
        &self,
        max_age_ms: u64,
        live_note_count: usize,
    ) -> Result<Arc<CacheEntry>, CacheValidity> {
        let entry = self.get().ok_or(CacheValidity::Missing)?;
        match self.validity_of(&entry, max_age_ms, live_note_count) {
            CacheValidity::Fresh => Ok(entry),
            CacheValidity::Corrupted(reason) => {
                tracing::warn!(%reason, "Discarding corrupted cache entry");
                let mut slot = self.entry.write();
                if slot.as_ref().map_or(false, |current| Arc::ptr_eq(current, &entry)) {
                    *slot = None;
                }
                Err(CacheValidity::Corrupted(reason))
            }
            stale => Err(stale),
        }
    }

    /// The current entry if it may be served
    pub fn get_valid(&self, max_age_ms: u64, live_note_count: usize) -> Option<Arc<CacheEntry>> {
        self.lookup(max_age_ms, live_note_count).ok()
    }

    /// Install an entry produced elsewhere, e.g. restored prior state.
    /// It is checked on every read like any other entry.
    pub fn restore(&self, entry: CacheEntry) {
        *self.entry.write() = Some(Arc::new(entry));
    }

    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Stop installing refresh results. Work already running finishes and is thrown away.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            completed: self.completed.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// Aggregate at every configured scale and swap in the result
    ///
    /// Returns `None` if another refresh is in flight or the manager is
    /// shut down.
    pub fn refresh(&self, notes: &[Note], config: &AggregationConfig) -> Option<Arc<CacheEntry>> {
        let _guard = self.try_begin()?;
        self.compute_and_install(notes, config)
    }

    fn try_begin(&self) -> Option<RefreshGuard> {
        if self.is_closed() {
            return None;
        }
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache refresh already in flight, coalescing");
            return None;
        }
        Some(RefreshGuard {
            flag: Arc::clone(&self.refreshing),
        })
    }

    fn compute_and_install(
        &self,
        notes: &[Note],
        config: &AggregationConfig,
    ) -> Option<Arc<CacheEntry>> {
        let multi_scale = self.aggregator.aggregate_multi_scale(notes, &config.scales);
        let result = match multi_scale.get(PRIMARY_SCALE) {
            Some(primary) => primary.clone(),
            None => self.aggregator.aggregate(notes, config.primary_window_ms()),
        };
        let entry = Arc::new(CacheEntry {
            result,
            multi_scale,
            computed_at: self.clock.now_ms(),
            source_note_count: notes.len(),
        });

        if self.is_closed() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                note_count = notes.len(),
                "Cache manager shut down, discarding refresh"
            );
            return None;
        }

        *self.entry.write() = Some(Arc::clone(&entry));
        self.completed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            note_count = entry.source_note_count,
            scales = entry.multi_scale.scales.len(),
            coherence = entry.result.coherence,
            "Cache refreshed"
        );
        Some(entry)
    }
}

impl<A: Aggregate + 'static> CacheManager<A> {
    /// Run [`refresh`](Self::refresh) on the tokio blocking pool
    ///
    /// Returns `None` without spawning when called outside a tokio runtime,
    /// when a refresh is already in flight, or after shutdown.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        notes: Vec<Note>,
        config: AggregationConfig,
    ) -> Option<JoinHandle<Option<Arc<CacheEntry>>>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, skipping background refresh");
            return None;
        };
        let guard = self.try_begin()?;
        let manager = Arc::clone(self);
        Some(runtime.spawn_blocking(move || {
            let _guard = guard;
            manager.compute_and_install(&notes, &config)
        }))
    }
}
