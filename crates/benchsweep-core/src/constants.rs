//! Constants for sweep defaults, artifact names, and exit codes.

/// Default number of repetitions per corpus.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// Default wall-clock timeout for one unit, in seconds (2 hours).
pub const DEFAULT_TIMEOUT_SECS: u64 = 7200;

/// Grace period between SIGTERM and SIGKILL when a unit times out.
pub const KILL_GRACE_SECS: u64 = 5;

/// Default modified Z-score threshold for MAD outlier detection.
pub const DEFAULT_MAD_THRESHOLD: f64 = 3.5;

/// Default interquartile-range multiplier for IQR outlier detection.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 3.0;

/// Default slowdown multiplier for cold-start detection.
pub const DEFAULT_COLD_START_MULTIPLIER: f64 = 3.0;

/// Minimum number of values before any outlier is flagged.
pub const MIN_OUTLIER_SAMPLE: usize = 4;

/// Minimum number of values that must remain after exclusion.
pub const MIN_RETAINED_VALUES: usize = 3;

/// Scale factor turning MAD into a consistent sigma estimate.
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// Required CV improvement (percentage points) before cold-start values are flagged.
pub const COLD_START_MIN_CV_GAIN: f64 = 15.0;

/// Top-K value whose latency/throughput is reported in summaries.
pub const REPORTED_TOP_K: u32 = 3;

/// Default benchmark command template.
pub const DEFAULT_BENCH_COMMAND: &str =
    "python Scripts/run_{system}_benchmark.py --corpus {corpus_path} --output {output}";

/// Artifact file names.
pub mod artifacts {
    /// Structured result written by the benchmark process.
    pub const RESULT_FILE: &str = "results.json";
    /// Captured stdout/stderr of the benchmark process.
    pub const LOG_FILE: &str = "benchmark.log";
    /// Per-corpus aggregated statistics.
    pub const AGGREGATED_FILE: &str = "aggregated_results.json";
    /// Durable sweep progress.
    pub const PROGRESS_FILE: &str = "experiment_progress.json";
    /// End-of-sweep summary.
    pub const SUMMARY_FILE: &str = "experiment_summary.json";
}

/// Process exit codes.
pub mod exit_codes {
    /// Sweep ran to completion (units may still be marked failed).
    pub const SUCCESS: i32 = 0;
    /// Unknown system or corpus, or malformed arguments.
    pub const ERROR_INVALID: i32 = 1;
    /// Environment prevented any unit from running.
    pub const ERROR_SETUP: i32 = 2;
    /// Durable checkpointing failed; the sweep stopped.
    pub const ERROR_PERSISTENCE: i32 = 3;
    /// Sweep cancelled by user (Ctrl+C).
    pub const ERROR_CANCELED: i32 = 130;
}
