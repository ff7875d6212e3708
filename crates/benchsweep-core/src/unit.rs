//! Work units: one benchmark attempt at a fixed (system, corpus, run) triple.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::result::RunResult;
use crate::system::TargetSystem;

/// Identity of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub system: TargetSystem,
    pub corpus: String,
    /// 1-based run index; determines the `run_<i>` directory.
    pub run_index: u32,
    /// Attempt-budget epoch this unit belongs to.
    pub epoch: u32,
}

impl WorkUnit {
    #[must_use]
    pub fn new(system: TargetSystem, corpus: impl Into<String>, run_index: u32, epoch: u32) -> Self {
        Self {
            system,
            corpus: corpus.into(),
            run_index,
            epoch,
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/run_{}", self.system, self.corpus, self.run_index)
    }
}

/// Lifecycle state of a unit. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Running,
    Success,
    Failed,
    TimedOut,
}

impl UnitStatus {
    /// Whether the unit has concluded.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::TimedOut)
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    #[must_use]
    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Success | Self::Failed | Self::TimedOut)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt did not produce a usable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitFailure {
    /// Nonzero exit, spawn failure, or no result artifact.
    ProcessCrashed { exit_code: Option<i32>, detail: String },
    /// Wall-clock budget exceeded; the process group was killed.
    TimedOut { after_secs: u64 },
    /// Artifact present but missing or invalid required fields.
    ResultMalformed { reason: String },
}

impl UnitFailure {
    /// Record a non-fatal executor error as a failed attempt.
    #[must_use]
    pub fn from_error(err: SweepError) -> Self {
        match err {
            SweepError::Timeout(after_secs) => Self::TimedOut { after_secs },
            SweepError::MalformedResult(reason) => Self::ResultMalformed { reason },
            SweepError::ProcessCrash(detail) => Self::ProcessCrashed {
                exit_code: None,
                detail,
            },
            other => Self::ProcessCrashed {
                exit_code: None,
                detail: other.to_string(),
            },
        }
    }

    /// Terminal status recorded for this failure.
    #[must_use]
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::TimedOut { .. } => UnitStatus::TimedOut,
            Self::ProcessCrashed { .. } | Self::ResultMalformed { .. } => UnitStatus::Failed,
        }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessCrashed {
                exit_code: Some(code),
                detail,
            } => write!(f, "process crashed (exit {code}): {detail}"),
            Self::ProcessCrashed {
                exit_code: None,
                detail,
            } => write!(f, "process crashed: {detail}"),
            Self::TimedOut { after_secs } => write!(f, "timed out after {after_secs}s"),
            Self::ResultMalformed { reason } => write!(f, "malformed result: {reason}"),
        }
    }
}

/// Result of executing one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Success(RunResult),
    Failed(UnitFailure),
}

impl UnitOutcome {
    /// Terminal status recorded for this outcome.
    #[must_use]
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::Success(_) => UnitStatus::Success,
            Self::Failed(failure) => failure.status(),
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&UnitFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}
