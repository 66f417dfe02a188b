//! The retention model: a pure function of stability, importance,
//! and elapsed time. Never stored — always derived from `now`.

use chrono::{DateTime, Utc};

/// Base half-life-ish constant, in days, before stability/importance
/// stretch it. The only two tunable constants in the decay curve.
pub const DECAY_BASE_DAYS: f64 = 30.0;
pub const IMPORTANCE_BOOST_COEFFICIENT: f64 = 2.0;

/// `retention(stability, importance, last_accessed, now) ∈ [0, 1]`.
///
/// ```text
/// days_elapsed = (now - last_accessed) / 86400s
/// boost        = 1 + 2·importance
/// τ            = max(1, stability · boost · 30)
/// retention    = clamp(exp(-days_elapsed / τ), 0, 1)
/// ```
pub fn retention(stability: f32, importance: f32, last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days_elapsed = (now - last_accessed).num_milliseconds() as f64 / 86_400_000.0;
    let boost = 1.0 + IMPORTANCE_BOOST_COEFFICIENT * importance as f64;
    let tau = (stability as f64 * boost * DECAY_BASE_DAYS).max(1.0);
    (-days_elapsed / tau).exp().clamp(0.0, 1.0)
}
