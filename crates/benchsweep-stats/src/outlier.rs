//! Outlier flagging against robust central estimates.
//!
//! Detection only returns positions; callers keep every value and exclude
//! the flagged ones from mean/std.

use benchsweep_core::constants::{
    COLD_START_MIN_CV_GAIN, MAD_CONSISTENCY, MIN_OUTLIER_SAMPLE, MIN_RETAINED_VALUES,
};
use benchsweep_core::OutlierPolicy;

use crate::summary::{coefficient_of_variation, mean, median, quantile, sample_std};

/// Positions of `values` flagged under `policy`, ascending.
///
/// Nothing is flagged for samples smaller than four, or when flagging would
/// leave fewer than three values.
#[must_use]
pub fn detect(values: &[f64], policy: OutlierPolicy) -> Vec<usize> {
    if values.len() < MIN_OUTLIER_SAMPLE {
        return Vec::new();
    }
    let flagged = match policy {
        OutlierPolicy::None => Vec::new(),
        OutlierPolicy::ModifiedZScore { threshold } => modified_z_score(values, threshold),
        OutlierPolicy::Iqr { multiplier } => tukey_fences(values, multiplier),
        OutlierPolicy::ColdStart { multiplier } => cold_start(values, multiplier),
    };
    if values.len() - flagged.len() < MIN_RETAINED_VALUES {
        tracing::debug!(
            flagged = flagged.len(),
            n = values.len(),
            "outlier exclusion would leave too few values, keeping all"
        );
        return Vec::new();
    }
    flagged
}

/// `|0.6745 (x − median) / MAD| > threshold`.
fn modified_z_score(values: &[f64], threshold: f64) -> Vec<usize> {
    let Some(med) = median(values) else {
        return Vec::new();
    };
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);
    if mad == 0.0 {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| (MAD_CONSISTENCY * (*v - med) / mad).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Outside `[Q1 − k·IQR, Q3 + k·IQR]`.
fn tukey_fences(values: &[f64], k: f64) -> Vec<usize> {
    let (Some(q1), Some(q3)) = (quantile(values, 0.25), quantile(values, 0.75)) else {
        return Vec::new();
    };
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - k * iqr, q3 + k * iqr);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lo || **v > hi)
        .map(|(i, _)| i)
        .collect()
}

/// The leading 1–3 values when they average at least `multiplier` times the
/// rest and dropping them improves the CV by more than 15 points.
fn cold_start(values: &[f64], multiplier: f64) -> Vec<usize> {
    let cv = |v: &[f64]| {
        let m = mean(v).unwrap_or(0.0);
        coefficient_of_variation(m, sample_std(v))
    };
    let cv_all = cv(values);

    let mut best: Option<(usize, f64)> = None;
    for lead in 1..=3 {
        if lead + MIN_RETAINED_VALUES > values.len() {
            break;
        }
        let (head, tail) = values.split_at(lead);
        let (Some(head_mean), Some(tail_mean)) = (mean(head), mean(tail)) else {
            continue;
        };
        if head_mean < multiplier * tail_mean {
            continue;
        }
        let gain = cv_all - cv(tail);
        if gain > best.map_or(0.0, |(_, g)| g) {
            best = Some((lead, gain));
        }
    }

    match best {
        Some((lead, gain)) if gain > COLD_START_MIN_CV_GAIN => (0..lead).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_flags_nothing() {
        assert!(detect(&[1.0, 1.0, 1.0, 100.0], OutlierPolicy::None).is_empty());
    }

    #[test]
    fn mad_flags_spike() {
        let values = [10.0, 10.2, 9.9, 10.1, 10.0, 35.0];
        let flagged = detect(&values, OutlierPolicy::ModifiedZScore { threshold: 3.5 });
        assert_eq!(flagged, vec![5]);
    }

    #[test]
    fn mad_with_zero_deviation_flags_nothing() {
        let values = [5.0, 5.0, 5.0, 5.0, 9.0];
        assert!(detect(&values, OutlierPolicy::ModifiedZScore { threshold: 3.5 }).is_empty());
    }

    #[test]
    fn iqr_flags_far_values() {
        let values = [10.0, 11.0, 10.5, 10.2, 10.8, 60.0];
        let flagged = detect(&values, OutlierPolicy::Iqr { multiplier: 3.0 });
        assert_eq!(flagged, vec![5]);
    }

    #[test]
    fn small_samples_are_never_flagged() {
        let values = [1.0, 1.0, 100.0];
        assert!(detect(&values, OutlierPolicy::Iqr { multiplier: 0.1 }).is_empty());
    }

    #[test]
    fn cold_start_flags_leading_runs() {
        let values = [120.0, 30.0, 31.0, 29.5, 30.5, 30.2];
        let flagged = detect(&values, OutlierPolicy::ColdStart { multiplier: 3.0 });
        assert_eq!(flagged, vec![0]);
    }

    #[test]
    fn cold_start_ignores_trailing_spike() {
        let values = [30.0, 31.0, 29.5, 30.5, 120.0];
        assert!(detect(&values, OutlierPolicy::ColdStart { multiplier: 3.0 }).is_empty());
    }

    #[test]
    fn exclusion_never_leaves_fewer_than_three() {
        // zero-width fences would flag both ends, leaving two
        let values = [0.0, 10.0, 10.0, 20.0];
        assert!(detect(&values, OutlierPolicy::Iqr { multiplier: 0.0 }).is_empty());
    }
}
