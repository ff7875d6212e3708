//! Sweep planner: which units run, in which order.
//!
//! Corpora are visited smallest first so configuration errors surface on
//! the cheapest runs. Within a corpus, run indices strictly ascend.

use benchsweep_core::{AttemptPolicy, CorpusSpec, SweepError, SweepOptions, TargetSystem, WorkUnit};

use crate::tracker::{CorpusStatus, ProgressTracker};

/// What the sweep does with one corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusAction {
    /// Execute these units, then conclude and aggregate. May be empty when
    /// only the conclusion is outstanding.
    Run(Vec<WorkUnit>),
    /// Already concluded; re-aggregate only.
    Done,
    /// Previously failed and not forced; left untouched.
    SkipFailed,
    /// Corpus directory absent or without documents.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPlan {
    pub corpus: CorpusSpec,
    pub action: CorpusAction,
}

/// Ordered work for one system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    pub system: TargetSystem,
    pub corpora: Vec<CorpusPlan>,
}

impl SweepPlan {
    /// Every queued unit, in execution order.
    pub fn units(&self) -> impl Iterator<Item = &WorkUnit> {
        self.corpora.iter().flat_map(|c| match &c.action {
            CorpusAction::Run(units) => units.as_slice(),
            _ => &[],
        })
    }
}

pub struct SweepPlanner<'a> {
    system: TargetSystem,
    options: &'a SweepOptions,
}

impl<'a> SweepPlanner<'a> {
    #[must_use]
    pub fn new(system: TargetSystem, options: &'a SweepOptions) -> Self {
        Self { system, options }
    }

    /// Build the plan, registering any newly created units with `tracker`.
    ///
    /// Stale `running` units must already have been reclaimed.
    pub fn plan(
        &self,
        available: &[CorpusSpec],
        missing: &[CorpusSpec],
        tracker: &mut ProgressTracker,
    ) -> Result<SweepPlan, SweepError> {
        let mut ordered: Vec<(&CorpusSpec, bool)> = available
            .iter()
            .map(|c| (c, true))
            .chain(missing.iter().map(|c| (c, false)))
            .collect();
        ordered.sort_by_key(|(c, _)| c.expected_chunks);

        let mut corpora = Vec::with_capacity(ordered.len());
        for (corpus, is_available) in ordered {
            let action = if is_available {
                self.plan_corpus(corpus, tracker)?
            } else {
                CorpusAction::Missing
            };
            tracing::debug!(system = %self.system, corpus = %corpus.name, ?action, "planned corpus");
            corpora.push(CorpusPlan {
                corpus: corpus.clone(),
                action,
            });
        }
        Ok(SweepPlan {
            system: self.system,
            corpora,
        })
    }

    fn plan_corpus(
        &self,
        corpus: &CorpusSpec,
        tracker: &mut ProgressTracker,
    ) -> Result<CorpusAction, SweepError> {
        let n = self.options.sample_size;
        let budget = self.options.attempt_budget();
        let Some(progress) = tracker.corpus(self.system, &corpus.name) else {
            let indices = run_range(1, n);
            let units = tracker.open_epoch(self.system, n, &corpus.name, budget, &indices)?;
            return Ok(CorpusAction::Run(units));
        };

        match progress.status {
            CorpusStatus::Completed => Ok(CorpusAction::Done),
            CorpusStatus::Failed if !self.options.force_retry => {
                tracing::warn!(
                    system = %self.system,
                    corpus = %corpus.name,
                    "corpus previously failed, skipping (use --force-retry for a new attempt budget)"
                );
                Ok(CorpusAction::SkipFailed)
            }
            CorpusStatus::Failed => {
                let indices = run_range(progress.last_run_index() + 1, n);
                tracing::info!(system = %self.system, corpus = %corpus.name, "forcing a new attempt epoch");
                let units = tracker.open_epoch(self.system, n, &corpus.name, budget, &indices)?;
                Ok(CorpusAction::Run(units))
            }
            CorpusStatus::InProgress => {
                let mut units: Vec<WorkUnit> = progress
                    .pending_indices()
                    .into_iter()
                    .map(|(run, epoch)| WorkUnit::new(self.system, &corpus.name, run, epoch))
                    .collect();
                if let Some(extra) = self.replacement(&corpus.name, tracker)? {
                    units.push(extra);
                }
                Ok(CorpusAction::Run(units))
            }
        }
    }

    /// Register one replacement attempt when the policy calls for it.
    ///
    /// Only [`AttemptPolicy::UntilSuccesses`] replaces failures, and only
    /// while the epoch's attempt budget allows.
    pub fn replacement(
        &self,
        corpus: &str,
        tracker: &mut ProgressTracker,
    ) -> Result<Option<WorkUnit>, SweepError> {
        if !matches!(self.options.attempt_policy, AttemptPolicy::UntilSuccesses { .. }) {
            return Ok(None);
        }
        let Some(progress) = tracker.corpus(self.system, corpus) else {
            return Ok(None);
        };
        let needed = progress.successful_runs + progress.outstanding() < self.options.sample_size;
        let allowed = progress.attempts_in_epoch() < progress.attempt_budget;
        if !(needed && allowed) {
            return Ok(None);
        }
        let next = progress.last_run_index() + 1;
        tracing::info!(system = %self.system, corpus, run = next, "scheduling replacement attempt");
        tracker.add_unit(self.system, corpus, next).map(Some)
    }
}

/// `count` consecutive run indices starting at `first`.
#[must_use]
pub fn run_range(first: u32, count: usize) -> Vec<u32> {
    (first..).take(count).collect()
}
