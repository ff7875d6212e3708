//! End-of-sweep summary artifact.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use benchsweep_core::constants::REPORTED_TOP_K;
use benchsweep_core::{AttemptPolicy, OutlierPolicy, UnitStatus};
use benchsweep_stats::AggregatedResult;

use crate::tracker::{CorpusProgress, CorpusStatus};

/// Final status of a corpus as reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusOutcome {
    Success,
    Failed,
    /// Failed in an earlier invocation and not retried.
    SkippedFailed,
    Missing,
    /// Not concluded because the sweep stopped early.
    Incomplete,
}

impl CorpusOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::SkippedFailed => "skipped_failed",
            Self::Missing => "missing",
            Self::Incomplete => "incomplete",
        }
    }

    #[must_use]
    pub fn from_progress(status: CorpusStatus) -> Self {
        match status {
            CorpusStatus::Completed => Self::Success,
            CorpusStatus::Failed => Self::Failed,
            CorpusStatus::InProgress => Self::Incomplete,
        }
    }
}

/// `mean ± std` of a headline metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatBrief {
    pub mean: f64,
    pub std: f64,
    pub cv_percent: f64,
    pub n: usize,
}

/// Metrics shown in the summary table.
#[must_use]
pub fn headline_metrics() -> Vec<String> {
    vec![
        "phase.total_s".to_string(),
        "ingestion.chunks_per_sec".to_string(),
        "latency.p50_ms".to_string(),
        "throughput.qps".to_string(),
        format!("quality.top{REPORTED_TOP_K}.recall"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusReport {
    pub corpus: String,
    pub expected_chunks: u64,
    pub status: CorpusOutcome,
    pub successful_runs: usize,
    pub attempts: usize,
    pub failed: usize,
    pub timed_out: usize,
    #[serde(default)]
    pub interrupted: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregated_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headline: BTreeMap<String, StatBrief>,
}

impl CorpusReport {
    /// A corpus that never reached execution.
    #[must_use]
    pub fn empty(corpus: &str, expected_chunks: u64, status: CorpusOutcome) -> Self {
        Self {
            corpus: corpus.to_string(),
            expected_chunks,
            status,
            successful_runs: 0,
            attempts: 0,
            failed: 0,
            timed_out: 0,
            interrupted: 0,
            aggregated_path: None,
            headline: BTreeMap::new(),
        }
    }

    /// Counts from the progress record, overriding the status.
    #[must_use]
    pub fn from_progress(progress: &CorpusProgress, expected_chunks: u64, status: CorpusOutcome) -> Self {
        let executed = progress.units.iter().filter(|u| !u.imported);
        Self {
            successful_runs: progress.successful_runs,
            attempts: executed.filter(|u| u.status.is_terminal()).count(),
            failed: progress.count(UnitStatus::Failed),
            timed_out: progress.count(UnitStatus::TimedOut),
            interrupted: progress.interrupted.len(),
            ..Self::empty(&progress.name, expected_chunks, status)
        }
    }

    /// Attach the aggregated artifact and its headline statistics.
    #[must_use]
    pub fn with_aggregate(mut self, path: PathBuf, aggregated: &AggregatedResult) -> Self {
        for name in headline_metrics() {
            let brief = if let Some(s) = aggregated.statistic(&name) {
                Some(StatBrief {
                    mean: s.mean,
                    std: s.std,
                    cv_percent: s.cv_percent,
                    n: s.used,
                })
            } else {
                aggregated.derived.get(&name).map(|d| StatBrief {
                    mean: d.mean,
                    std: d.std,
                    cv_percent: benchsweep_stats::summary::coefficient_of_variation(d.mean, d.std),
                    n: aggregated.n_runs,
                })
            };
            if let Some(brief) = brief {
                self.headline.insert(name, brief);
            }
        }
        self.aggregated_path = Some(path);
        self
    }
}

/// Snapshot of the machine the sweep ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub cpu_model: String,
    pub logical_cores: usize,
    pub total_memory_mb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

impl HostInfo {
    #[must_use]
    pub fn capture() -> Self {
        use sysinfo::System;
        let sys = System::new_all();
        Self {
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().trim().to_string())
                .unwrap_or_default(),
            logical_cores: sys.cpus().len(),
            total_memory_mb: sys.total_memory() / (1024 * 1024),
            os: System::long_os_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub system: String,
    pub requested_sample_size: usize,
    pub attempt_policy: AttemptPolicy,
    pub outlier_policy: OutlierPolicy,
    pub started_at: u64,
    pub finished_at: u64,
    /// Whether every planned corpus reached a conclusion.
    pub completed: bool,
    pub host: HostInfo,
    pub corpora: Vec<CorpusReport>,
}

impl SweepSummary {
    /// Number of corpora with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: CorpusOutcome) -> usize {
        self.corpora.iter().filter(|c| c.status == outcome).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ProgressTracker;
    use benchsweep_core::{TargetSystem, UnitFailure, UnitOutcome};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn report_counts_attempts_by_kind() {
        let dir = TempDir::new().unwrap();
        let mut t = ProgressTracker::open(&dir.path().join("p.json")).unwrap();
        let sys = TargetSystem::Milvus;
        let units = t.open_epoch(sys, 3, "1k", 3, &[1, 2, 3]).unwrap();
        let outcomes = [
            UnitOutcome::Failed(UnitFailure::TimedOut { after_secs: 5 }),
            UnitOutcome::Failed(UnitFailure::ResultMalformed {
                reason: "x".into(),
            }),
        ];
        for (unit, outcome) in units.iter().zip(&outcomes) {
            t.record_start(unit).unwrap();
            t.record_finish(unit, outcome, Duration::from_secs(1)).unwrap();
        }
        let progress = t.corpus(sys, "1k").unwrap();
        let report = CorpusReport::from_progress(progress, 5562, CorpusOutcome::Incomplete);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.successful_runs, 0);
        assert_eq!(report.status.as_str(), "incomplete");
    }

    #[test]
    fn outcome_from_progress_status() {
        assert_eq!(
            CorpusOutcome::from_progress(CorpusStatus::Completed),
            CorpusOutcome::Success
        );
        assert_eq!(
            CorpusOutcome::from_progress(CorpusStatus::InProgress),
            CorpusOutcome::Incomplete
        );
    }

    #[test]
    fn headline_includes_reported_top_k() {
        assert!(headline_metrics().contains(&"quality.top3.recall".to_string()));
    }
}
