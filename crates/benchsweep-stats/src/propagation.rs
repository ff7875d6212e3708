//! First-order uncertainty propagation for derived rates.
//!
//! For `rate = count / time` with an exact `count`, linearizing around the
//! mean time gives
//!
//! ```text
//! σ_rate ≈ rate · σ_time / mean_time
//! ```
//!
//! This is a first-order approximation. It ignores the curvature of `1/t`
//! and is biased for small samples or large relative spread in `time`; it is
//! not an exact standard deviation of the per-run rates.

use serde::{Deserialize, Serialize};

use benchsweep_core::result::CHUNK_COUNT_METRIC;

/// Method tag recorded alongside every derived statistic.
pub const FIRST_ORDER_METHOD: &str = "first_order_linearization";

/// Derived rates: (name, count metric, time metric).
pub const DERIVED_RATES: &[(&str, &str, &str)] = &[
    ("ingestion.chunks_per_sec", CHUNK_COUNT_METRIC, "phase.total_s"),
    ("ingestion.embed_chunks_per_sec", CHUNK_COUNT_METRIC, "phase.embed_s"),
    ("ingestion.insert_chunks_per_sec", CHUNK_COUNT_METRIC, "phase.insert_s"),
];

/// A rate and its propagated standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEstimate {
    pub rate: f64,
    pub std: f64,
}

/// Propagate the spread of `time` into `count / time`.
///
/// Returns `None` when the mean time is not positive.
#[must_use]
pub fn propagate_rate(count: f64, mean_time: f64, std_time: f64) -> Option<RateEstimate> {
    if mean_time.is_nan() || mean_time <= 0.0 || !count.is_finite() {
        return None;
    }
    let rate = count / mean_time;
    Some(RateEstimate {
        rate,
        std: rate * (std_time / mean_time),
    })
}

/// A derived metric as stored in the aggregated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStatistic {
    pub mean: f64,
    pub std: f64,
    pub numerator: String,
    pub denominator: String,
    pub method: String,
}

impl DerivedStatistic {
    #[must_use]
    pub fn first_order(estimate: RateEstimate, numerator: &str, denominator: &str) -> Self {
        Self {
            mean: estimate.rate,
            std: estimate.std,
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            method: FIRST_ORDER_METHOD.to_string(),
        }
    }
}
