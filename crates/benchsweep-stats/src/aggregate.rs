//! Reduction of a corpus's raw runs into aggregate statistics.
//!
//! An [`AggregatedResult`] is always computed from the raw [`RunRecord`]s it
//! retains. Merging two aggregates re-runs [`aggregate`] over the union of
//! their raw runs, so the result does not depend on how the runs were
//! partitioned or in which order they arrived.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use benchsweep_core::result::CHUNK_COUNT_METRIC;
use benchsweep_core::{OutlierPolicy, RunResult, SweepError};

use crate::outlier;
use crate::propagation::{propagate_rate, DerivedStatistic, DERIVED_RATES};
use crate::summary::{coefficient_of_variation, describe};

/// One successful run, identified by its run index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_index: u32,
    pub result: RunResult,
}

impl RunRecord {
    #[must_use]
    pub fn new(run_index: u32, result: RunResult) -> Self {
        Self { run_index, result }
    }
}

/// Statistics for one metric across the runs that report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistic {
    /// Mean over the values not flagged as outliers.
    pub mean: f64,
    /// Sample standard deviation over the same values; zero for one value.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub cv_percent: f64,
    /// Every contributing value, ordered by run index. Flagged values stay.
    pub values: Vec<f64>,
    /// Run index of each entry in `values`.
    pub runs: Vec<u32>,
    /// Run indices flagged as outliers and left out of mean/std.
    #[serde(default)]
    pub excluded: Vec<u32>,
    /// Number of runs in which the metric was present.
    pub count: usize,
    /// Number of values that entered mean/std.
    pub used: usize,
}

impl MetricStatistic {
    /// Values that entered the mean/std computation.
    pub fn used_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .iter()
            .zip(&self.runs)
            .filter(|(_, run)| !self.excluded.contains(*run))
            .map(|(v, _)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Success,
    Failed,
}

/// Aggregated artifact for one corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub corpus: String,
    pub requested_sample_size: usize,
    /// Successful runs aggregated.
    pub n_runs: usize,
    pub status: AggregateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub outlier_policy: OutlierPolicy,
    pub statistics: BTreeMap<String, MetricStatistic>,
    #[serde(default)]
    pub derived: BTreeMap<String, DerivedStatistic>,
    /// First run with every metric replaced by its mean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_result: Option<RunResult>,
    pub individual_runs: Vec<RunRecord>,
}

impl AggregatedResult {
    /// A marked-failed result with no statistics body.
    #[must_use]
    pub fn failed(corpus: &str, requested_sample_size: usize, policy: OutlierPolicy) -> Self {
        let err = SweepError::Aggregation(format!("corpus '{corpus}' has no successful runs"));
        Self {
            corpus: corpus.to_string(),
            requested_sample_size,
            n_runs: 0,
            status: AggregateStatus::Failed,
            failure: Some(err.to_string()),
            outlier_policy: policy,
            statistics: BTreeMap::new(),
            derived: BTreeMap::new(),
            mean_result: None,
            individual_runs: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == AggregateStatus::Success
    }

    /// Highest run index among the retained runs.
    #[must_use]
    pub fn last_run_index(&self) -> Option<u32> {
        self.individual_runs.last().map(|r| r.run_index)
    }

    #[must_use]
    pub fn statistic(&self, metric: &str) -> Option<&MetricStatistic> {
        self.statistics.get(metric)
    }

    /// Recompute from the retained raw runs, optionally with a new policy.
    pub fn reaggregate(&self, policy: OutlierPolicy) -> Result<Self, SweepError> {
        aggregate(
            &self.corpus,
            self.requested_sample_size,
            self.individual_runs.clone(),
            policy,
        )
    }
}

/// Aggregate a corpus's successful runs.
///
/// Runs are ordered by run index. A run index appearing twice with an
/// identical result is counted once; with differing results it is an
/// [`SweepError::Aggregation`]. Zero runs produce a marked-failed result.
pub fn aggregate(
    corpus: &str,
    requested_sample_size: usize,
    runs: Vec<RunRecord>,
    policy: OutlierPolicy,
) -> Result<AggregatedResult, SweepError> {
    let runs = canonical_runs(corpus, runs)?;
    if runs.is_empty() {
        tracing::warn!(corpus, "no successful runs to aggregate");
        return Ok(AggregatedResult::failed(corpus, requested_sample_size, policy));
    }

    let mut samples: BTreeMap<String, (Vec<u32>, Vec<f64>)> = BTreeMap::new();
    for run in &runs {
        for (name, value) in run.result.metrics() {
            let entry = samples.entry(name).or_default();
            entry.0.push(run.run_index);
            entry.1.push(value);
        }
    }

    let mut statistics = BTreeMap::new();
    for (name, (run_indices, values)) in samples {
        // the chunk count is exact, never an outlier candidate
        let flagged = if name == CHUNK_COUNT_METRIC {
            Vec::new()
        } else {
            outlier::detect(&values, policy)
        };
        if !flagged.is_empty() {
            tracing::info!(corpus, metric = %name, flagged = flagged.len(), %policy, "outliers excluded from statistics");
        }
        if let Some(stat) = metric_statistic(&run_indices, values, &flagged) {
            statistics.insert(name, stat);
        }
    }

    let derived = derive_rates(corpus, &statistics);

    let mut mean_result = runs[0].result.clone();
    for (name, stat) in &statistics {
        if !mean_result.set_metric(name, stat.mean) && name != CHUNK_COUNT_METRIC {
            tracing::debug!(corpus, metric = %name, "metric has no slot in the merged result");
        }
    }

    tracing::debug!(corpus, runs = runs.len(), metrics = statistics.len(), "aggregated corpus");

    Ok(AggregatedResult {
        corpus: corpus.to_string(),
        requested_sample_size,
        n_runs: runs.len(),
        status: AggregateStatus::Success,
        failure: None,
        outlier_policy: policy,
        statistics,
        derived,
        mean_result: Some(mean_result),
        individual_runs: runs,
    })
}

/// Aggregate the union of the raw runs behind two aggregates.
///
/// The requested sample size of the result is the larger of the two.
pub fn merge(
    a: &AggregatedResult,
    b: &AggregatedResult,
    policy: OutlierPolicy,
) -> Result<AggregatedResult, SweepError> {
    if a.corpus != b.corpus {
        return Err(SweepError::Aggregation(format!(
            "cannot merge corpus '{}' with corpus '{}'",
            a.corpus, b.corpus
        )));
    }
    let runs = a
        .individual_runs
        .iter()
        .chain(&b.individual_runs)
        .cloned()
        .collect();
    aggregate(
        &a.corpus,
        a.requested_sample_size.max(b.requested_sample_size),
        runs,
        policy,
    )
}

fn canonical_runs(corpus: &str, mut runs: Vec<RunRecord>) -> Result<Vec<RunRecord>, SweepError> {
    runs.sort_by_key(|r| r.run_index);
    let mut unique: Vec<RunRecord> = Vec::with_capacity(runs.len());
    for run in runs {
        match unique.last() {
            Some(prev) if prev.run_index == run.run_index => {
                if prev.result != run.result {
                    return Err(SweepError::Aggregation(format!(
                        "corpus '{corpus}': run {} appears twice with different results",
                        run.run_index
                    )));
                }
            }
            _ => unique.push(run),
        }
    }
    Ok(unique)
}

fn metric_statistic(runs: &[u32], values: Vec<f64>, flagged: &[usize]) -> Option<MetricStatistic> {
    let used: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(i, _)| !flagged.contains(i))
        .map(|(_, v)| *v)
        .collect();
    let summary = describe(&used)?;
    Some(MetricStatistic {
        mean: summary.mean,
        std: summary.std,
        min: summary.min,
        max: summary.max,
        cv_percent: coefficient_of_variation(summary.mean, summary.std),
        count: values.len(),
        used: used.len(),
        excluded: flagged.iter().map(|&i| runs[i]).collect(),
        runs: runs.to_vec(),
        values,
    })
}

fn derive_rates(
    corpus: &str,
    statistics: &BTreeMap<String, MetricStatistic>,
) -> BTreeMap<String, DerivedStatistic> {
    let mut derived = BTreeMap::new();
    for &(name, numerator, denominator) in DERIVED_RATES {
        let (Some(count), Some(time)) = (statistics.get(numerator), statistics.get(denominator))
        else {
            continue;
        };
        if count.min != count.max {
            tracing::warn!(
                corpus,
                metric = name,
                min = count.min,
                max = count.max,
                "chunk count differs across runs, using its mean"
            );
        }
        if let Some(estimate) = propagate_rate(count.mean, time.mean, time.std) {
            derived.insert(
                name.to_string(),
                DerivedStatistic::first_order(estimate, numerator, denominator),
            );
        }
    }
    derived
}
