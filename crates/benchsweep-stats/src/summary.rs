//! Descriptive statistics over a list of measurements.

use serde::{Deserialize, Serialize};

/// Mean, spread, and range of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Sample standard deviation (N−1 denominator); zero when N = 1.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// `std / mean × 100`, zero when the mean is zero.
    pub cv_percent: f64,
    pub n: usize,
}

/// Summarize `values`; `None` for an empty sample.
#[must_use]
pub fn describe(values: &[f64]) -> Option<Summary> {
    let mean = mean(values)?;
    let std = sample_std(values);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Summary {
        mean,
        std,
        min,
        max,
        cv_percent: coefficient_of_variation(mean, std),
        n: values.len(),
    })
}

/// Arithmetic mean.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with Bessel's correction.
///
/// A single observation has no spread to estimate from; this crate defines
/// its standard deviation as zero rather than leaving it undefined.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Relative dispersion in percent.
#[must_use]
pub fn coefficient_of_variation(mean: f64, std: f64) -> f64 {
    if mean == 0.0 {
        0.0
    } else {
        std / mean.abs() * 100.0
    }
}

/// Quantile with linear interpolation between closest ranks.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}
