//! Recency decay
//!
//! Weights are a pure function of age, so no running state is kept
//! between aggregation passes.

/// `decay_factor ^ (age_ms / unit_ms)`, clamped to [0, 1]
///
/// A zero unit is treated as one millisecond. Negative ages (notes
/// newer than the reference time) count as fresh.
pub fn decay_weight(decay_factor: f64, age_ms: i64, unit_ms: u64) -> f64 {
    let age = age_ms.max(0) as f64;
    let unit = unit_ms.max(1) as f64;
    let weight = decay_factor.powf(age / unit);
    if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
