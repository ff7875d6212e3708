//! Application configuration from CLI flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use benchsweep_core::constants::{DEFAULT_BENCH_COMMAND, DEFAULT_SAMPLE_SIZE};
use benchsweep_core::{AttemptPolicy, OutlierPolicy, SweepError, SweepOptions, TargetSystem};

/// Resumable N-run benchmark sweeps with audited aggregate statistics.
#[derive(Parser, Debug)]
#[command(name = "benchsweep", version, about)]
pub struct AppConfig {
    /// Log progress details (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// No progress bar or summary table.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run or resume a sweep.
    Run(RunArgs),
    /// Extend a finished sweep to a larger sample size.
    Upgrade(UpgradeArgs),
    /// Recompute aggregated results of a sweep from its run artifacts.
    Aggregate(AggregateArgs),
    /// Watch a sweep directory without modifying it.
    Monitor(MonitorArgs),
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AttemptPolicyArg {
    /// N attempts per corpus; failures consume a slot.
    Fixed,
    /// Replace failures until N successes or --max-attempts.
    UntilSuccess,
}

/// Options shared by `run` and `upgrade`.
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    /// Target system (faiss, chroma, qdrant, weaviate, milvus, opensearch, pgvector).
    #[arg(value_parser = parse_system, env = "BENCHSWEEP_SYSTEM")]
    pub system: TargetSystem,

    /// Restrict the sweep to these corpora (repeatable).
    #[arg(long = "corpus", env = "BENCHSWEEP_CORPUS", value_delimiter = ',')]
    pub corpora: Vec<String>,

    /// Per-unit timeout ("2h", "90m", "30s", or seconds).
    #[arg(long, default_value = "7200", value_parser = parse_duration, env = "BENCHSWEEP_TIMEOUT")]
    pub timeout: Duration,

    #[arg(long, value_enum, default_value = "fixed", env = "BENCHSWEEP_ATTEMPT_POLICY")]
    pub attempt_policy: AttemptPolicyArg,

    /// Attempt cap per corpus for `until-success` (default 2×N).
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Outlier handling before mean/std.
    #[arg(
        long,
        default_value = "none",
        value_parser = ["none", "mad", "iqr", "cold-start"],
        env = "BENCHSWEEP_OUTLIERS"
    )]
    pub outliers: String,

    /// Threshold for the outlier policy (|z| for mad, k for iqr, slowdown for cold-start).
    #[arg(long)]
    pub outlier_threshold: Option<f64>,

    /// Give corpora previously marked failed a new attempt budget.
    #[arg(long)]
    pub force_retry: bool,

    #[arg(long, default_value = "results", env = "BENCHSWEEP_RESULTS_DIR")]
    pub results_dir: PathBuf,

    /// Directory that relative corpus paths are resolved against.
    #[arg(long, env = "BENCHSWEEP_CORPUS_ROOT")]
    pub corpus_root: Option<PathBuf>,

    /// JSON corpus catalog replacing the built-in one.
    #[arg(long, env = "BENCHSWEEP_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Benchmark command template.
    #[arg(long, default_value = DEFAULT_BENCH_COMMAND, env = "BENCHSWEEP_BENCH_CMD")]
    pub bench_cmd: String,

    /// Shell command run once the sweep has finished.
    #[arg(long, env = "BENCHSWEEP_ON_COMPLETE")]
    pub on_complete: Option<String>,
}

impl SweepArgs {
    /// Sweep options for a target of `sample_size` successful runs.
    pub fn options(&self, sample_size: usize) -> Result<SweepOptions, SweepError> {
        if sample_size == 0 {
            return Err(SweepError::InvalidArgument(
                "the number of runs must be at least 1".to_string(),
            ));
        }
        let attempt_policy = match self.attempt_policy {
            AttemptPolicyArg::Fixed => {
                if self.max_attempts.is_some() {
                    tracing::warn!("--max-attempts only applies to --attempt-policy until-success");
                }
                AttemptPolicy::FixedEpoch
            }
            AttemptPolicyArg::UntilSuccess => AttemptPolicy::UntilSuccesses {
                max_attempts: self.max_attempts.unwrap_or(sample_size * 2),
            },
        };
        Ok(SweepOptions {
            sample_size,
            timeout: self.timeout,
            attempt_policy,
            outlier_policy: outlier_policy(&self.outliers, self.outlier_threshold)?,
            force_retry: self.force_retry,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub sweep: SweepArgs,

    /// Successful runs wanted per corpus.
    #[arg(short = 'n', long = "runs", default_value_t = DEFAULT_SAMPLE_SIZE, env = "BENCHSWEEP_RUNS")]
    pub runs: usize,
}

#[derive(Args, Debug, Clone)]
pub struct UpgradeArgs {
    #[command(flatten)]
    pub sweep: SweepArgs,

    /// Sample size of the archived sweep.
    #[arg(long)]
    pub from: usize,

    /// Sample size to extend it to.
    #[arg(long)]
    pub to: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    /// Sweep directory (e.g. results/faiss_scaling_n3).
    pub dir: PathBuf,

    #[arg(long, default_value = "none", value_parser = ["none", "mad", "iqr", "cold-start"])]
    pub outliers: String,

    #[arg(long)]
    pub outlier_threshold: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Sweep directory (e.g. results/faiss_scaling_n3).
    pub dir: PathBuf,

    /// Refresh every SECS seconds until Ctrl+C.
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Log lines of the running unit to show.
    #[arg(long, default_value_t = 20)]
    pub lines: usize,
}

impl AppConfig {
    /// Parse CLI arguments, leaving exit handling to the caller.
    pub fn try_parse_args() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}

pub fn outlier_policy(name: &str, threshold: Option<f64>) -> Result<OutlierPolicy, SweepError> {
    if let Some(t) = threshold {
        if !(t.is_finite() && t > 0.0) {
            return Err(SweepError::InvalidArgument(format!(
                "outlier threshold must be positive, got {t}"
            )));
        }
    }
    OutlierPolicy::from_name(name, threshold)
        .ok_or_else(|| SweepError::InvalidArgument(format!("unknown outlier policy '{name}'")))
}

fn parse_system(s: &str) -> Result<TargetSystem, SweepError> {
    s.parse()
}

/// Parse a duration string like "2h", "90m", "30s", or plain seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, scale) = if let Some(h) = s.strip_suffix('h') {
        (h, 3600)
    } else if let Some(m) = s.strip_suffix('m') {
        (m, 60)
    } else if let Some(sec) = s.strip_suffix('s') {
        (sec, 1)
    } else {
        (s, 1)
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{s}'"))?;
    if n == 0 {
        return Err("duration must be positive".to_string());
    }
    n.checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
