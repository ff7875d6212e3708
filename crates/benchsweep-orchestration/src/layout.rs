//! On-disk layout of one sweep.
//!
//! ```text
//! <results-dir>/<system>_scaling_n<N>/
//!   experiment_progress.json
//!   experiment_summary.json
//!   corpus_<name>/
//!     aggregated_results.json
//!     run_<i>/results.json
//!     run_<i>/benchmark.log
//! ```

use std::path::{Path, PathBuf};

use benchsweep_core::constants::artifacts::{
    AGGREGATED_FILE, LOG_FILE, PROGRESS_FILE, RESULT_FILE, SUMMARY_FILE,
};
use benchsweep_core::TargetSystem;

/// Paths of every artifact under one sweep directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLayout {
    root: PathBuf,
}

impl SweepLayout {
    /// Layout for `system` at sample size `sample_size` under `results_dir`.
    #[must_use]
    pub fn new(results_dir: &Path, system: TargetSystem, sample_size: usize) -> Self {
        Self {
            root: results_dir.join(format!("{system}_scaling_n{sample_size}")),
        }
    }

    /// Layout rooted at an existing sweep directory.
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn progress_path(&self) -> PathBuf {
        self.root.join(PROGRESS_FILE)
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    #[must_use]
    pub fn corpus_dir(&self, corpus: &str) -> PathBuf {
        self.root.join(format!("corpus_{corpus}"))
    }

    #[must_use]
    pub fn aggregated_path(&self, corpus: &str) -> PathBuf {
        self.corpus_dir(corpus).join(AGGREGATED_FILE)
    }

    #[must_use]
    pub fn run_dir(&self, corpus: &str, run_index: u32) -> PathBuf {
        self.corpus_dir(corpus).join(format!("run_{run_index}"))
    }

    #[must_use]
    pub fn result_path(&self, corpus: &str, run_index: u32) -> PathBuf {
        self.run_dir(corpus, run_index).join(RESULT_FILE)
    }

    /// Most recent log artifact of a run, if any was written.
    #[must_use]
    pub fn latest_log(&self, corpus: &str, run_index: u32) -> Option<PathBuf> {
        latest_log_in(&self.run_dir(corpus, run_index))
    }
}

/// First log path in `run_dir` that does not exist yet.
///
/// The first execution writes `benchmark.log`; re-executions write
/// `benchmark.log.1`, `benchmark.log.2`, and so on.
#[must_use]
pub fn next_log_path(run_dir: &Path) -> PathBuf {
    let base = run_dir.join(LOG_FILE);
    if !base.exists() {
        return base;
    }
    (1u32..)
        .map(|n| run_dir.join(format!("{LOG_FILE}.{n}")))
        .find(|p| !p.exists())
        .unwrap_or(base)
}

/// Highest-numbered existing log artifact in `run_dir`.
#[must_use]
pub fn latest_log_in(run_dir: &Path) -> Option<PathBuf> {
    let base = run_dir.join(LOG_FILE);
    if !base.exists() {
        return None;
    }
    let mut latest = base;
    for n in 1u32.. {
        let candidate = run_dir.join(format!("{LOG_FILE}.{n}"));
        if !candidate.exists() {
            break;
        }
        latest = candidate;
    }
    Some(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sweep_paths() {
        let layout = SweepLayout::new(Path::new("/r"), TargetSystem::Qdrant, 10);
        assert_eq!(layout.root(), Path::new("/r/qdrant_scaling_n10"));
        assert_eq!(
            layout.result_path("10k", 4),
            PathBuf::from("/r/qdrant_scaling_n10/corpus_10k/run_4/results.json")
        );
        assert_eq!(
            layout.aggregated_path("1k"),
            PathBuf::from("/r/qdrant_scaling_n10/corpus_1k/aggregated_results.json")
        );
        assert!(layout.progress_path().ends_with("experiment_progress.json"));
        assert!(layout.summary_path().ends_with("experiment_summary.json"));
    }

    #[test]
    fn log_paths_never_repeat() {
        let dir = TempDir::new().unwrap();
        assert!(latest_log_in(dir.path()).is_none());

        let first = next_log_path(dir.path());
        assert!(first.ends_with("benchmark.log"));
        std::fs::write(&first, "a").unwrap();

        let second = next_log_path(dir.path());
        assert!(second.ends_with("benchmark.log.1"));
        std::fs::write(&second, "b").unwrap();

        assert!(next_log_path(dir.path()).ends_with("benchmark.log.2"));
        assert_eq!(latest_log_in(dir.path()), Some(second));
    }
}
