//! Durable sweep progress.
//!
//! The whole [`ProgressState`] is rewritten after every mutation through
//! [`write_json_atomic`], so the file on disk is always a complete snapshot.
//! Readers such as the monitor load it fresh with [`ProgressTracker::load_snapshot`]
//! and never share the tracker's in-memory copy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use benchsweep_core::persist::{read_json, write_json_atomic};
use benchsweep_core::{unix_now, SweepError, TargetSystem, UnitFailure, UnitOutcome, UnitStatus, WorkUnit};

/// Schema version of the progress artifact.
pub const STATE_VERSION: u32 = 1;

/// Conclusion state of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusStatus {
    InProgress,
    /// Concluded with at least one successful run.
    Completed,
    /// Concluded with zero successful runs after the attempt budget.
    Failed,
}

/// One attempt as recorded on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub run_index: u32,
    pub epoch: u32,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<UnitFailure>,
    /// Carried over from an earlier sweep by an upgrade; never executed here.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub imported: bool,
}

impl UnitRecord {
    fn pending(run_index: u32, epoch: u32) -> Self {
        Self {
            run_index,
            epoch,
            status: UnitStatus::Pending,
            started_at: None,
            finished_at: None,
            duration_secs: None,
            failure: None,
            imported: false,
        }
    }

    fn is_outstanding(&self) -> bool {
        matches!(self.status, UnitStatus::Pending | UnitStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusProgress {
    pub name: String,
    pub status: CorpusStatus,
    pub successful_runs: usize,
    /// Current attempt epoch; 0 holds imported runs only.
    pub epoch: u32,
    /// Attempts allowed in the current epoch.
    pub attempt_budget: usize,
    pub units: Vec<UnitRecord>,
    /// Attempts that were running when the orchestrator stopped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interrupted: Vec<UnitRecord>,
}

impl CorpusProgress {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CorpusStatus::InProgress,
            successful_runs: 0,
            epoch: 0,
            attempt_budget: 0,
            units: Vec::new(),
            interrupted: Vec::new(),
        }
    }

    /// Attempts registered in the current epoch, imported runs excluded.
    #[must_use]
    pub fn attempts_in_epoch(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.epoch == self.epoch && !u.imported)
            .count()
    }

    #[must_use]
    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status && !u.imported).count()
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.units.iter().filter(|u| u.is_outstanding()).count()
    }

    /// Highest run index ever used, including interrupted attempts.
    #[must_use]
    pub fn last_run_index(&self) -> u32 {
        self.units
            .iter()
            .chain(&self.interrupted)
            .map(|u| u.run_index)
            .max()
            .unwrap_or(0)
    }

    /// Run indices of every successful (or imported) run, ascending.
    #[must_use]
    pub fn successful_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .units
            .iter()
            .filter(|u| u.status == UnitStatus::Success)
            .map(|u| u.run_index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Pending units in run-index order.
    #[must_use]
    pub fn pending_indices(&self) -> Vec<(u32, u32)> {
        let mut pending: Vec<(u32, u32)> = self
            .units
            .iter()
            .filter(|u| u.status == UnitStatus::Pending)
            .map(|u| (u.run_index, u.epoch))
            .collect();
        pending.sort_unstable();
        pending
    }

    fn record_mut(&mut self, unit: &WorkUnit) -> Option<&mut UnitRecord> {
        self.units
            .iter_mut()
            .find(|u| u.run_index == unit.run_index && u.epoch == unit.epoch && !u.imported)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemProgress {
    pub sample_size: usize,
    pub corpora: Vec<CorpusProgress>,
}

/// Snapshot of every unit known to a sweep, keyed by system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub version: u32,
    pub updated_at: u64,
    pub systems: BTreeMap<String, SystemProgress>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: 0,
            systems: BTreeMap::new(),
        }
    }
}

impl ProgressState {
    #[must_use]
    pub fn corpus(&self, system: TargetSystem, corpus: &str) -> Option<&CorpusProgress> {
        self.systems
            .get(system.as_str())?
            .corpora
            .iter()
            .find(|c| c.name == corpus)
    }

    fn corpora(&self) -> impl Iterator<Item = &CorpusProgress> {
        self.systems.values().flat_map(|s| &s.corpora)
    }

    fn executed_units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.corpora().flat_map(|c| &c.units).filter(|u| !u.imported)
    }

    /// Units registered for execution in this sweep.
    #[must_use]
    pub fn total_units(&self) -> usize {
        self.executed_units().count()
    }

    /// Units that have concluded.
    #[must_use]
    pub fn finished_units(&self) -> usize {
        self.executed_units().filter(|u| u.status.is_terminal()).count()
    }

    #[must_use]
    pub fn pending_units(&self) -> usize {
        self.executed_units()
            .filter(|u| u.status == UnitStatus::Pending)
            .count()
    }

    /// The unit currently recorded as running, as `(system, corpus, run)`.
    #[must_use]
    pub fn running_unit(&self) -> Option<(&str, &str, u32)> {
        self.systems.iter().find_map(|(system, progress)| {
            progress.corpora.iter().find_map(|c| {
                c.units
                    .iter()
                    .find(|u| u.status == UnitStatus::Running)
                    .map(|u| (system.as_str(), c.name.as_str(), u.run_index))
            })
        })
    }

    /// Mean duration of successful units times the number still pending.
    ///
    /// `None` until at least one unit has succeeded.
    #[must_use]
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let durations: Vec<f64> = self
            .executed_units()
            .filter(|u| u.status == UnitStatus::Success)
            .filter_map(|u| u.duration_secs)
            .collect();
        if durations.is_empty() {
            return None;
        }
        let mean = durations.iter().sum::<f64>() / durations.len() as f64;
        Some(Duration::from_secs_f64(mean * self.pending_units() as f64))
    }
}

/// Runs carried into a sweep from an earlier, smaller one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusImport {
    /// Run indices of archived successes.
    pub successful: Vec<u32>,
    pub status: CorpusStatus,
    /// Indices of the new runs that extend the archive.
    pub new_runs: Vec<u32>,
    /// Attempt budget for the new runs.
    pub budget: usize,
}

/// Owner of the durable progress artifact for one sweep directory.
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    state: ProgressState,
}

impl ProgressTracker {
    /// Load the progress artifact at `path`, or start empty if absent.
    pub fn open(path: &Path) -> Result<Self, SweepError> {
        let state = if path.exists() {
            let state: ProgressState = read_json(path)?;
            if state.version != STATE_VERSION {
                return Err(SweepError::State(format!(
                    "{} has version {}, expected {STATE_VERSION}",
                    path.display(),
                    state.version
                )));
            }
            tracing::debug!(path = %path.display(), "resuming from progress state");
            state
        } else {
            ProgressState::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    /// Read-only view of the artifact as currently on disk.
    pub fn load_snapshot(path: &Path) -> Result<ProgressState, SweepError> {
        read_json(path)
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn corpus(&self, system: TargetSystem, corpus: &str) -> Option<&CorpusProgress> {
        self.state.corpus(system, corpus)
    }

    fn save(&mut self) -> Result<(), SweepError> {
        self.state.updated_at = unix_now();
        write_json_atomic(&self.path, &self.state)
    }

    fn corpus_entry(
        &mut self,
        system: TargetSystem,
        sample_size: usize,
        corpus: &str,
    ) -> &mut CorpusProgress {
        let sys = self
            .state
            .systems
            .entry(system.as_str().to_string())
            .or_insert_with(|| SystemProgress {
                sample_size,
                corpora: Vec::new(),
            });
        if let Some(pos) = sys.corpora.iter().position(|c| c.name == corpus) {
            &mut sys.corpora[pos]
        } else {
            sys.corpora.push(CorpusProgress::new(corpus));
            let last = sys.corpora.len() - 1;
            &mut sys.corpora[last]
        }
    }

    fn corpus_mut(
        &mut self,
        system: TargetSystem,
        corpus: &str,
    ) -> Result<&mut CorpusProgress, SweepError> {
        self.state
            .systems
            .get_mut(system.as_str())
            .and_then(|s| s.corpora.iter_mut().find(|c| c.name == corpus))
            .ok_or_else(|| SweepError::State(format!("no progress record for {system}/{corpus}")))
    }

    /// Open a new attempt epoch with pending units at `run_indices`.
    pub fn open_epoch(
        &mut self,
        system: TargetSystem,
        sample_size: usize,
        corpus: &str,
        budget: usize,
        run_indices: &[u32],
    ) -> Result<Vec<WorkUnit>, SweepError> {
        let record = self.corpus_entry(system, sample_size, corpus);
        record.epoch += 1;
        record.status = CorpusStatus::InProgress;
        record.attempt_budget = budget;
        let epoch = record.epoch;
        record
            .units
            .extend(run_indices.iter().map(|&i| UnitRecord::pending(i, epoch)));
        tracing::info!(%system, corpus, epoch, units = run_indices.len(), "opened attempt epoch");
        self.save()?;
        Ok(run_indices
            .iter()
            .map(|&i| WorkUnit::new(system, corpus, i, epoch))
            .collect())
    }

    /// Append a pending unit to the current epoch.
    pub fn add_unit(
        &mut self,
        system: TargetSystem,
        corpus: &str,
        run_index: u32,
    ) -> Result<WorkUnit, SweepError> {
        let record = self.corpus_mut(system, corpus)?;
        let epoch = record.epoch;
        record.units.push(UnitRecord::pending(run_index, epoch));
        self.save()?;
        Ok(WorkUnit::new(system, corpus, run_index, epoch))
    }

    /// Record runs carried over from an earlier sweep, together with the
    /// epoch of new runs that extends them, in a single state write.
    ///
    /// Successful runs land in epoch 0 as imported successes.
    pub fn import_corpus(
        &mut self,
        system: TargetSystem,
        sample_size: usize,
        corpus: &str,
        import: &CorpusImport,
    ) -> Result<Vec<WorkUnit>, SweepError> {
        let record = self.corpus_entry(system, sample_size, corpus);
        if !record.units.is_empty() || record.epoch > 0 {
            return Err(SweepError::State(format!(
                "{system}/{corpus} already has progress, refusing to import"
            )));
        }
        record.status = import.status;
        record.successful_runs = import.successful.len();
        record.units = import
            .successful
            .iter()
            .map(|&run_index| UnitRecord {
                status: UnitStatus::Success,
                imported: true,
                ..UnitRecord::pending(run_index, 0)
            })
            .collect();
        let mut units = Vec::with_capacity(import.new_runs.len());
        if !import.new_runs.is_empty() {
            record.epoch = 1;
            record.attempt_budget = import.budget;
            record
                .units
                .extend(import.new_runs.iter().map(|&i| UnitRecord::pending(i, 1)));
            units.extend(
                import
                    .new_runs
                    .iter()
                    .map(|&i| WorkUnit::new(system, corpus, i, 1)),
            );
        }
        self.save()?;
        Ok(units)
    }

    /// Mark a pending unit as running.
    pub fn record_start(&mut self, unit: &WorkUnit) -> Result<(), SweepError> {
        let record = self
            .corpus_mut(unit.system, &unit.corpus)?
            .record_mut(unit)
            .ok_or_else(|| SweepError::State(format!("{unit} is not registered")))?;
        transition(record, UnitStatus::Running, unit)?;
        record.started_at = Some(unix_now());
        self.save()
    }

    /// Record a unit's outcome. Failures are values here, never errors.
    pub fn record_finish(
        &mut self,
        unit: &WorkUnit,
        outcome: &UnitOutcome,
        duration: Duration,
    ) -> Result<(), SweepError> {
        let corpus = self.corpus_mut(unit.system, &unit.corpus)?;
        let record = corpus
            .record_mut(unit)
            .ok_or_else(|| SweepError::State(format!("{unit} is not registered")))?;
        transition(record, outcome.status(), unit)?;
        record.finished_at = Some(unix_now());
        record.duration_secs = Some(duration.as_secs_f64());
        record.failure = outcome.failure().cloned();
        if outcome.status() == UnitStatus::Success {
            corpus.successful_runs += 1;
        }
        self.save()
    }

    /// Whether the corpus has reached its target or exhausted its budget.
    #[must_use]
    pub fn is_complete(&self, system: TargetSystem, corpus: &str) -> bool {
        let Some(sample_size) = self.state.systems.get(system.as_str()).map(|s| s.sample_size)
        else {
            return false;
        };
        let Some(c) = self.corpus(system, corpus) else {
            return false;
        };
        c.status != CorpusStatus::InProgress
            || (c.outstanding() == 0
                && (c.successful_runs >= sample_size || c.attempts_in_epoch() >= c.attempt_budget))
    }

    /// Close a corpus: completed with any success, failed with none.
    pub fn conclude(&mut self, system: TargetSystem, corpus: &str) -> Result<CorpusStatus, SweepError> {
        let record = self.corpus_mut(system, corpus)?;
        if record.outstanding() > 0 {
            return Err(SweepError::State(format!(
                "{system}/{corpus} still has {} outstanding units",
                record.outstanding()
            )));
        }
        record.status = if record.successful_runs > 0 {
            CorpusStatus::Completed
        } else {
            CorpusStatus::Failed
        };
        let status = record.status;
        self.save()?;
        Ok(status)
    }

    /// Move units left `running` by a stopped orchestrator into the corpus's
    /// interrupted history and register a fresh pending unit for each.
    ///
    /// Returns the number of units reclaimed.
    pub fn reclaim_interrupted(&mut self) -> Result<usize, SweepError> {
        let mut reclaimed = 0;
        for (system, progress) in &mut self.state.systems {
            for corpus in &mut progress.corpora {
                for record in &mut corpus.units {
                    if record.status != UnitStatus::Running {
                        continue;
                    }
                    let fresh = UnitRecord::pending(record.run_index, record.epoch);
                    tracing::warn!(
                        system = %system,
                        corpus = %corpus.name,
                        run = record.run_index,
                        "unit was interrupted, it will be re-executed from scratch"
                    );
                    corpus.interrupted.push(std::mem::replace(record, fresh));
                    reclaimed += 1;
                }
            }
        }
        if reclaimed > 0 {
            self.save()?;
        }
        Ok(reclaimed)
    }
}

fn transition(record: &mut UnitRecord, next: UnitStatus, unit: &WorkUnit) -> Result<(), SweepError> {
    if !record.status.can_transition_to(next) {
        return Err(SweepError::State(format!(
            "{unit}: illegal transition {} -> {next}",
            record.status
        )));
    }
    record.status = next;
    Ok(())
}
