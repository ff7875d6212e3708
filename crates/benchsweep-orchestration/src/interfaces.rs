//! Orchestration interfaces.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use benchsweep_core::{SweepError, TargetSystem, UnitFailure, UnitStatus, WorkUnit};

use crate::summary::{CorpusReport, SweepSummary};

/// Trait for reporting sweep progress to the user.
pub trait SweepReporter {
    /// The plan is known; `total` units are queued.
    fn sweep_started(&self, system: TargetSystem, total: usize);

    /// `position` is 1-based within the queue.
    fn unit_started(&self, unit: &WorkUnit, position: usize, total: usize);

    fn unit_finished(
        &self,
        unit: &WorkUnit,
        status: UnitStatus,
        failure: Option<&UnitFailure>,
        duration: Duration,
        remaining: Option<Duration>,
    );

    /// A corpus concluded, was skipped, or was found missing.
    fn corpus_reported(&self, report: &CorpusReport);

    fn sweep_finished(&self, summary: &SweepSummary);
}

/// Null reporter (does nothing).
pub struct NullReporter;

impl SweepReporter for NullReporter {
    fn sweep_started(&self, _system: TargetSystem, _total: usize) {}
    fn unit_started(&self, _unit: &WorkUnit, _position: usize, _total: usize) {}
    fn unit_finished(
        &self,
        _unit: &WorkUnit,
        _status: UnitStatus,
        _failure: Option<&UnitFailure>,
        _duration: Duration,
        _remaining: Option<Duration>,
    ) {
    }
    fn corpus_reported(&self, _report: &CorpusReport) {}
    fn sweep_finished(&self, _summary: &SweepSummary) {}
}

/// Follow-up action run once the sweep has finished.
pub trait CompletionHook {
    fn on_complete(&self, summary_path: &Path, sweep_dir: &Path) -> Result<(), SweepError>;
}

/// Runs a shell command with `BENCHSWEEP_SUMMARY` and
/// `BENCHSWEEP_SWEEP_DIR` set.
#[derive(Debug, Clone)]
pub struct CommandHook {
    command: String,
}

impl CommandHook {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl CompletionHook for CommandHook {
    fn on_complete(&self, summary_path: &Path, sweep_dir: &Path) -> Result<(), SweepError> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.args(["/C", &self.command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", &self.command]);
            c
        };
        tracing::info!(command = %self.command, "running completion hook");
        let status = cmd
            .env("BENCHSWEEP_SUMMARY", summary_path)
            .env("BENCHSWEEP_SWEEP_DIR", sweep_dir)
            .status()
            .map_err(|e| SweepError::ProcessCrash(format!("completion hook: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(SweepError::ProcessCrash(format!(
                "completion hook '{}' exited with {status}",
                self.command
            )))
        }
    }
}
