//! Sweep options and policies.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COLD_START_MULTIPLIER, DEFAULT_IQR_MULTIPLIER, DEFAULT_MAD_THRESHOLD,
    DEFAULT_SAMPLE_SIZE, DEFAULT_TIMEOUT_SECS,
};

/// How failed attempts count against a corpus's budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptPolicy {
    #[default]
    /// Exactly N attempts per epoch; failures and timeouts consume a slot.
    FixedEpoch,
    /// Replace failed attempts until N successes or `max_attempts` attempts.
    UntilSuccesses { max_attempts: usize },
}

impl AttemptPolicy {
    /// Attempts allowed in one epoch for a target of `sample_size` successes.
    #[must_use]
    pub fn budget(self, sample_size: usize) -> usize {
        match self {
            Self::FixedEpoch => sample_size,
            Self::UntilSuccesses { max_attempts } => max_attempts.max(sample_size),
        }
    }
}

/// Robust outlier detection applied before computing mean/std.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OutlierPolicy {
    #[default]
    None,
    /// Modified Z-score against the median absolute deviation.
    ModifiedZScore { threshold: f64 },
    /// Tukey fences at `multiplier` interquartile ranges.
    Iqr { multiplier: f64 },
    /// Leading runs much slower than the rest (warm-up effects).
    ColdStart { multiplier: f64 },
}

impl OutlierPolicy {
    /// Build a policy from its CLI name and optional threshold override.
    pub fn from_name(name: &str, threshold: Option<f64>) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "mad" => Some(Self::ModifiedZScore {
                threshold: threshold.unwrap_or(DEFAULT_MAD_THRESHOLD),
            }),
            "iqr" => Some(Self::Iqr {
                multiplier: threshold.unwrap_or(DEFAULT_IQR_MULTIPLIER),
            }),
            "cold-start" => Some(Self::ColdStart {
                multiplier: threshold.unwrap_or(DEFAULT_COLD_START_MULTIPLIER),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for OutlierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::ModifiedZScore { threshold } => write!(f, "mad(|z| > {threshold})"),
            Self::Iqr { multiplier } => write!(f, "iqr({multiplier}x)"),
            Self::ColdStart { multiplier } => write!(f, "cold-start({multiplier}x)"),
        }
    }
}

/// Options shared by sweeps and upgrades.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Target number of successful runs per corpus.
    pub sample_size: usize,
    /// Wall-clock budget for one unit.
    pub timeout: Duration,
    pub attempt_policy: AttemptPolicy,
    pub outlier_policy: OutlierPolicy,
    /// Open a new attempt epoch for corpora previously marked failed.
    pub force_retry: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            attempt_policy: AttemptPolicy::default(),
            outlier_policy: OutlierPolicy::default(),
            force_retry: false,
        }
    }
}

impl SweepOptions {
    /// Attempts allowed per corpus epoch.
    #[must_use]
    pub fn attempt_budget(&self) -> usize {
        self.attempt_policy.budget(self.sample_size)
    }
}
