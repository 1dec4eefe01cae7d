//! Configuration for temporal aggregation
//!
//! Handles window sizes, decay, scales, cache staleness bounds and the
//! coherence blend. Misconfiguration is the only condition Cadence reports
//! as a hard error, and it is caught here, before any note is processed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

/// Default window size for single-scale aggregation
pub const DEFAULT_WINDOW_SIZE_MS: u64 = 10_000;
/// Default per-window recency discount
pub const DEFAULT_DECAY_FACTOR: f64 = 0.9;
/// Default maximum age of a served cache entry
pub const DEFAULT_MAX_CACHE_AGE_MS: u64 = 5_000;
/// Default lookback for activity classification
pub const DEFAULT_ACTIVITY_LOOKBACK_MS: u64 = 5_000;
/// Default number of notes a cache entry may lag the live store by
pub const DEFAULT_MAX_NOTE_DELTA: usize = 10;
/// Default score gap for adjacent-window conflicts
pub const DEFAULT_CONFLICT_THRESHOLD: f64 = 2.0;
/// Default variance below which the last scores count as stable
pub const DEFAULT_STABILITY_VARIANCE_THRESHOLD: f64 = 1.0;

/// Weight of the direction-consistency sub-signal
pub const DIRECTION_CONSISTENCY_WEIGHT: f64 = 0.35;
/// Weight of the stability sub-signal
pub const STABILITY_WEIGHT: f64 = 0.25;
/// Weight of the variance-coherence sub-signal
pub const VARIANCE_COHERENCE_WEIGHT: f64 = 0.25;
/// Weight of the observation-consistency sub-signal
pub const OBSERVATION_CONSISTENCY_WEIGHT: f64 = 0.15;

/// Share of the direction-change rate subtracted from variance coherence.
/// Empirical default, not derived.
pub const DIRECTION_CHANGE_PENALTY: f64 = 0.7;
/// Lower bound on the variance normaliser
pub const VARIANCE_FLOOR: f64 = 10.0;
/// Coherence reported when an intermediate is NaN or infinite
pub const NEUTRAL_COHERENCE: f64 = 0.5;
/// Coherence reported when there is nothing to be inconsistent about
pub const DEGENERATE_COHERENCE: f64 = 1.0;
/// Weighted-score gap under which two results are equivocal. Empirical default.
pub const EQUIVOCAL_QUALITY_GAP: f64 = 0.5;
/// Notes a window needs before it can take part in a conflict
pub const HIGH_CONFIDENCE_NOTES: usize = 3;
/// Notes per second above which activity is HIGH
pub const HIGH_ACTIVITY_RATE: f64 = 10.0;
/// Notes per second above which activity is at least MEDIUM
pub const MEDIUM_ACTIVITY_RATE: f64 = 1.0;
/// Number of trailing scores inspected for stability
pub const STABILITY_TAIL: usize = 5;
/// Upper bound on generated summary text, in characters
pub const MAX_SUMMARY_CHARS: usize = 280;

/// Name of the scale used for single-result outputs
pub const PRIMARY_SCALE: &str = "medium";

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("decay factor must be in (0, 1], got {0}")]
    InvalidDecayFactor(f64),
    #[error("window size must be positive, got {0}ms")]
    InvalidWindowSize(u64),
    #[error("scale '{name}' has invalid window size {window_ms}ms")]
    InvalidScale { name: String, window_ms: u64 },
    #[error("coherence weights must be non-negative and sum to 1.0, got sum {0}")]
    InvalidWeights(f64),
    #[error("invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("could not parse {name}='{value}'")]
    Parse { name: String, value: String },
}

/// Blend weights for the four coherence sub-signals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceWeights {
    pub direction_consistency: f64,
    pub stability: f64,
    pub variance_coherence: f64,
    pub observation_consistency: f64,
}

impl Default for CoherenceWeights {
    fn default() -> Self {
        Self {
            direction_consistency: DIRECTION_CONSISTENCY_WEIGHT,
            stability: STABILITY_WEIGHT,
            variance_coherence: VARIANCE_COHERENCE_WEIGHT,
            observation_consistency: OBSERVATION_CONSISTENCY_WEIGHT,
        }
    }
}

impl CoherenceWeights {
    pub fn sum(&self) -> f64 {
        self.direction_consistency
            + self.stability
            + self.variance_coherence
            + self.observation_consistency
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parts = [
            self.direction_consistency,
            self.stability,
            self.variance_coherence,
            self.observation_consistency,
        ];
        let sum = self.sum();
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) || (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeights(sum));
        }
        Ok(())
    }
}

/// Default multi-resolution scales
pub fn default_scales() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("immediate".to_string(), 100),
        ("short".to_string(), 1_000),
        ("medium".to_string(), 5_000),
        ("long".to_string(), 30_000),
    ])
}

/// Full aggregation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Window size for single-scale aggregation
    pub window_size_ms: u64,
    /// Recency discount per elapsed window, in (0, 1]
    pub decay_factor: f64,
    /// Named window sizes for multi-scale aggregation
    pub scales: BTreeMap<String, u64>,
    /// Maximum age of a served cache entry
    pub max_cache_age_ms: u64,
    /// Lookback for activity classification
    pub activity_lookback_ms: u64,
    /// Notes a cache entry may lag the live store by before it is stale
    pub max_note_delta: usize,
    /// Minimum score gap for an adjacent-window conflict
    pub conflict_threshold: f64,
    /// Variance of the last scores below which the stream is stable
    pub stability_variance_threshold: f64,
    /// Coherence blend
    pub coherence_weights: CoherenceWeights,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_size_ms: DEFAULT_WINDOW_SIZE_MS,
            decay_factor: DEFAULT_DECAY_FACTOR,
            scales: default_scales(),
            max_cache_age_ms: DEFAULT_MAX_CACHE_AGE_MS,
            activity_lookback_ms: DEFAULT_ACTIVITY_LOOKBACK_MS,
            max_note_delta: DEFAULT_MAX_NOTE_DELTA,
            conflict_threshold: DEFAULT_CONFLICT_THRESHOLD,
            stability_variance_threshold: DEFAULT_STABILITY_VARIANCE_THRESHOLD,
            coherence_weights: CoherenceWeights::default(),
        }
    }
}

impl AggregationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_size_ms(mut self, window_size_ms: u64) -> Self {
        self.window_size_ms = window_size_ms;
        self
    }

    pub fn with_decay_factor(mut self, decay_factor: f64) -> Self {
        self.decay_factor = decay_factor;
        self
    }

    /// Add or replace one named scale
    pub fn with_scale(mut self, name: &str, window_ms: u64) -> Self {
        self.scales.insert(name.to_string(), window_ms);
        self
    }

    /// Replace the whole scale table
    pub fn with_scales(mut self, scales: BTreeMap<String, u64>) -> Self {
        self.scales = scales;
        self
    }

    pub fn with_max_cache_age_ms(mut self, max_cache_age_ms: u64) -> Self {
        self.max_cache_age_ms = max_cache_age_ms;
        self
    }

    pub fn with_activity_lookback_ms(mut self, activity_lookback_ms: u64) -> Self {
        self.activity_lookback_ms = activity_lookback_ms;
        self
    }

    pub fn with_max_note_delta(mut self, max_note_delta: usize) -> Self {
        self.max_note_delta = max_note_delta;
        self
    }

    pub fn with_conflict_threshold(mut self, conflict_threshold: f64) -> Self {
        self.conflict_threshold = conflict_threshold;
        self
    }

    pub fn with_coherence_weights(mut self, weights: CoherenceWeights) -> Self {
        self.coherence_weights = weights;
        self
    }

    /// Window size used for single-result outputs: the `medium` scale if
    /// configured, otherwise `window_size_ms`.
    pub fn primary_window_ms(&self) -> u64 {
        self.scales
            .get(PRIMARY_SCALE)
            .copied()
            .unwrap_or(self.window_size_ms)
    }

    /// Reject values that signal a programming error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(ConfigError::InvalidDecayFactor(self.decay_factor));
        }
        if self.window_size_ms == 0 {
            return Err(ConfigError::InvalidWindowSize(self.window_size_ms));
        }
        for (name, window_ms) in &self.scales {
            if *window_ms == 0 || name.trim().is_empty() {
                return Err(ConfigError::InvalidScale {
                    name: name.clone(),
                    window_ms: *window_ms,
                });
            }
        }
        if self.activity_lookback_ms == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "activity_lookback_ms",
                value: 0.0,
            });
        }
        if !self.conflict_threshold.is_finite() || self.conflict_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                name: "conflict_threshold",
                value: self.conflict_threshold,
            });
        }
        if !self.stability_variance_threshold.is_finite() || self.stability_variance_threshold < 0.0
        {
            return Err(ConfigError::InvalidThreshold {
                name: "stability_variance_threshold",
                value: self.stability_variance_threshold,
            });
        }
        self.coherence_weights.validate()
    }

    /// Defaults overlaid with `CADENCE_*` environment variables, validated
    ///
    /// Reads:
    /// - CADENCE_WINDOW_SIZE_MS
    /// - CADENCE_DECAY_FACTOR
    /// - CADENCE_MAX_CACHE_AGE_MS
    /// - CADENCE_ACTIVITY_LOOKBACK_MS
    /// - CADENCE_MAX_NOTE_DELTA
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = env_parse("CADENCE_WINDOW_SIZE_MS")? {
            config.window_size_ms = v;
        }
        if let Some(v) = env_parse("CADENCE_DECAY_FACTOR")? {
            config.decay_factor = v;
        }
        if let Some(v) = env_parse("CADENCE_MAX_CACHE_AGE_MS")? {
            config.max_cache_age_ms = v;
        }
        if let Some(v) = env_parse("CADENCE_ACTIVITY_LOOKBACK_MS")? {
            config.activity_lookback_ms = v;
        }
        if let Some(v) = env_parse("CADENCE_MAX_NOTE_DELTA")? {
            config.max_note_delta = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
