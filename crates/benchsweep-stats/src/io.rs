//! Aggregated artifact persistence (load/save).

use std::path::Path;

use benchsweep_core::persist::{read_json, write_json_atomic};
use benchsweep_core::SweepError;

use crate::aggregate::AggregatedResult;

/// Atomically write an aggregated artifact.
pub fn save_aggregated(path: &Path, result: &AggregatedResult) -> Result<(), SweepError> {
    write_json_atomic(path, result)?;
    tracing::debug!(path = %path.display(), corpus = %result.corpus, "saved aggregated result");
    Ok(())
}

/// Load an aggregated artifact.
pub fn load_aggregated(path: &Path) -> Result<AggregatedResult, SweepError> {
    read_json(path)
}

/// Load an aggregated artifact if one exists.
pub fn load_aggregated_if_exists(path: &Path) -> Result<Option<AggregatedResult>, SweepError> {
    if !path.exists() {
        return Ok(None);
    }
    load_aggregated(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, RunRecord};
    use benchsweep_core::{OutlierPolicy, RunResult};
    use tempfile::TempDir;

    const RUN: &str = r#"{
        "chunk_count": 175,
        "latency_ms": {"p50": 1.0, "p95": 2.0, "p99": 3.0, "min": 0.5, "max": 4.0},
        "throughput_qps": 250.0,
        "phases_sec": {"total": 9.5, "parse": 1.5, "embed": 6.0, "insert": 2.0},
        "resources": {
            "cpu_percent": {"avg": 40.0, "max": 80.0, "min": 5.0},
            "memory_mb": {"avg": 512.0, "max": 600.0, "min": 480.0}
        }
    }"#;

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus_baseline").join("aggregated_results.json");
        let run = RunResult::from_json_str(RUN).unwrap();
        let agg = aggregate(
            "baseline",
            3,
            vec![RunRecord::new(1, run.clone()), RunRecord::new(2, run)],
            OutlierPolicy::Iqr { multiplier: 3.0 },
        )
        .unwrap();

        save_aggregated(&path, &agg).unwrap();
        assert_eq!(load_aggregated(&path).unwrap(), agg);
    }

    #[test]
    fn missing_artifact_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_aggregated_if_exists(&dir.path().join("aggregated_results.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("aggregated_results.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_aggregated(&path).unwrap_err(),
            SweepError::Json { .. }
        ));
    }
}
