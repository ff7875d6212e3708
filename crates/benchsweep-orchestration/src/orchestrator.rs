//! Sequential sweep driver.
//!
//! Units never run concurrently. The driver blocks on each unit's completion
//! signal, checkpoints after every transition, and aggregates a corpus as
//! soon as its attempts conclude.

use std::collections::VecDeque;
use std::time::Instant;

use benchsweep_core::persist::write_json_atomic;
use benchsweep_core::{
    unix_now, CancellationToken, CorpusSpec, RunResult, SweepError, SweepOptions, TargetSystem,
    UnitFailure, UnitOutcome, UnitStatus, WorkUnit,
};
use benchsweep_stats::io::save_aggregated;
use benchsweep_stats::{aggregate, AggregatedResult, RunRecord};

use crate::executor::RunExecutor;
use crate::interfaces::{CompletionHook, SweepReporter};
use crate::layout::SweepLayout;
use crate::planner::{CorpusAction, CorpusPlan, SweepPlan, SweepPlanner};
use crate::summary::{CorpusOutcome, CorpusReport, HostInfo, SweepSummary};
use crate::tracker::ProgressTracker;

/// Everything one sweep invocation needs.
pub struct SweepContext<'a> {
    pub system: TargetSystem,
    pub options: &'a SweepOptions,
    pub layout: &'a SweepLayout,
    pub executor: &'a dyn RunExecutor,
    pub reporter: &'a dyn SweepReporter,
    pub hook: Option<&'a dyn CompletionHook>,
    pub cancel: &'a CancellationToken,
}

/// Split corpora into those with documents on disk and those without.
#[must_use]
pub fn partition_available(corpora: Vec<CorpusSpec>) -> (Vec<CorpusSpec>, Vec<CorpusSpec>) {
    let (available, missing): (Vec<_>, Vec<_>) =
        corpora.into_iter().partition(CorpusSpec::has_documents);
    for corpus in &missing {
        tracing::warn!(corpus = %corpus.name, path = %corpus.path.display(), "corpus not found, skipping");
    }
    (available, missing)
}

/// Run (or resume) a sweep in `ctx.layout`.
pub fn run_sweep(
    ctx: &SweepContext<'_>,
    available: &[CorpusSpec],
    missing: &[CorpusSpec],
) -> Result<SweepSummary, SweepError> {
    let mut tracker = ProgressTracker::open(&ctx.layout.progress_path())?;
    run_sweep_with(ctx, &mut tracker, available, missing)
}

/// Run a sweep against an already opened tracker.
pub fn run_sweep_with(
    ctx: &SweepContext<'_>,
    tracker: &mut ProgressTracker,
    available: &[CorpusSpec],
    missing: &[CorpusSpec],
) -> Result<SweepSummary, SweepError> {
    if available.is_empty() {
        return Err(SweepError::Setup(
            "no corpus is available; nothing can run".to_string(),
        ));
    }
    let started_at = unix_now();

    let reclaimed = tracker.reclaim_interrupted()?;
    if reclaimed > 0 {
        tracing::info!(reclaimed, "resuming after interruption");
    }

    let planner = SweepPlanner::new(ctx.system, ctx.options);
    let plan = planner.plan(available, missing, tracker)?;
    let mut driver = Driver {
        ctx,
        planner,
        position: 0,
        total: plan.units().count(),
    };
    ctx.reporter.sweep_started(ctx.system, driver.total);
    tracing::info!(system = %ctx.system, units = driver.total, dir = %ctx.layout.root().display(), "sweep started");

    let mut reports = Vec::with_capacity(plan.corpora.len());
    let outcome = driver.execute(&plan, tracker, &mut reports);

    for corpus_plan in plan.corpora.iter().skip(reports.len()) {
        reports.push(unfinished_report(tracker, ctx.system, corpus_plan));
    }

    let summary = SweepSummary {
        system: ctx.system.to_string(),
        requested_sample_size: ctx.options.sample_size,
        attempt_policy: ctx.options.attempt_policy,
        outlier_policy: ctx.options.outlier_policy,
        started_at,
        finished_at: unix_now(),
        completed: outcome.is_ok(),
        host: HostInfo::capture(),
        corpora: reports,
    };
    let summary_path = ctx.layout.summary_path();

    if let Err(e) = outcome {
        if let Err(write_err) = write_json_atomic(&summary_path, &summary) {
            tracing::error!(error = %write_err, "could not write partial summary");
        }
        ctx.reporter.sweep_finished(&summary);
        return Err(e);
    }

    write_json_atomic(&summary_path, &summary)?;
    ctx.reporter.sweep_finished(&summary);
    tracing::info!(
        system = %ctx.system,
        success = summary.count(CorpusOutcome::Success),
        failed = summary.count(CorpusOutcome::Failed),
        "sweep finished"
    );

    if let Some(hook) = ctx.hook {
        if let Err(e) = hook.on_complete(&summary_path, ctx.layout.root()) {
            tracing::warn!(error = %e, "completion hook failed");
        }
    }
    Ok(summary)
}

struct Driver<'c, 'a> {
    ctx: &'c SweepContext<'a>,
    planner: SweepPlanner<'a>,
    position: usize,
    total: usize,
}

impl Driver<'_, '_> {
    fn execute(
        &mut self,
        plan: &SweepPlan,
        tracker: &mut ProgressTracker,
        reports: &mut Vec<CorpusReport>,
    ) -> Result<(), SweepError> {
        for corpus_plan in &plan.corpora {
            let corpus = &corpus_plan.corpus;
            let report = match &corpus_plan.action {
                CorpusAction::Missing => {
                    CorpusReport::empty(&corpus.name, corpus.expected_chunks, CorpusOutcome::Missing)
                }
                CorpusAction::SkipFailed => skipped_report(tracker, self.ctx, corpus),
                CorpusAction::Done => finalize_corpus(self.ctx, tracker, corpus)?,
                CorpusAction::Run(units) => {
                    self.run_corpus(corpus, units, tracker)?;
                    if !tracker.is_complete(self.ctx.system, &corpus.name) {
                        return Err(SweepError::State(format!(
                            "{}/{} ran out of units before reaching its target or budget",
                            self.ctx.system, corpus.name
                        )));
                    }
                    let status = tracker.conclude(self.ctx.system, &corpus.name)?;
                    tracing::info!(corpus = %corpus.name, ?status, "corpus concluded");
                    finalize_corpus(self.ctx, tracker, corpus)?
                }
            };
            self.ctx.reporter.corpus_reported(&report);
            reports.push(report);
        }
        Ok(())
    }

    fn run_corpus(
        &mut self,
        corpus: &CorpusSpec,
        units: &[WorkUnit],
        tracker: &mut ProgressTracker,
    ) -> Result<(), SweepError> {
        let ctx = self.ctx;
        let mut queue: VecDeque<WorkUnit> = units.iter().cloned().collect();
        while let Some(unit) = queue.pop_front() {
            ctx.cancel.check_cancelled()?;
            self.position += 1;
            tracker.record_start(&unit)?;
            ctx.reporter.unit_started(&unit, self.position, self.total);

            let run_dir = ctx.layout.run_dir(&unit.corpus, unit.run_index);
            let started = Instant::now();
            let outcome = match ctx
                .executor
                .execute(&unit, corpus, &run_dir, ctx.options.timeout, ctx.cancel)
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => UnitOutcome::Failed(UnitFailure::from_error(e)),
            };
            let elapsed = started.elapsed();

            tracker.record_finish(&unit, &outcome, elapsed)?;
            ctx.reporter.unit_finished(
                &unit,
                outcome.status(),
                outcome.failure(),
                elapsed,
                tracker.state().estimate_remaining(),
            );

            if outcome.status() != UnitStatus::Success {
                if let Some(extra) = self.planner.replacement(&corpus.name, tracker)? {
                    self.total += 1;
                    queue.push_back(extra);
                }
            }
        }
        Ok(())
    }
}

/// Aggregate a concluded corpus from its successful run artifacts.
fn finalize_corpus(
    ctx: &SweepContext<'_>,
    tracker: &ProgressTracker,
    corpus: &CorpusSpec,
) -> Result<CorpusReport, SweepError> {
    let Some(progress) = tracker.corpus(ctx.system, &corpus.name) else {
        return Ok(CorpusReport::empty(
            &corpus.name,
            corpus.expected_chunks,
            CorpusOutcome::Incomplete,
        ));
    };

    let runs = load_runs(ctx.layout, &corpus.name, &progress.successful_indices());
    let aggregated = aggregate(
        &corpus.name,
        ctx.options.sample_size,
        runs,
        ctx.options.outlier_policy,
    )
    .unwrap_or_else(|e| {
        tracing::error!(corpus = %corpus.name, error = %e, "aggregation failed");
        AggregatedResult::failed(&corpus.name, ctx.options.sample_size, ctx.options.outlier_policy)
    });
    let path = ctx.layout.aggregated_path(&corpus.name);
    save_aggregated(&path, &aggregated)?;

    let status = CorpusOutcome::from_progress(progress.status);
    Ok(CorpusReport::from_progress(progress, corpus.expected_chunks, status)
        .with_aggregate(path, &aggregated))
}

/// Load the result artifacts of successful runs, skipping unreadable ones.
pub fn load_runs(layout: &SweepLayout, corpus: &str, indices: &[u32]) -> Vec<RunRecord> {
    indices
        .iter()
        .filter_map(|&run| {
            let path = layout.result_path(corpus, run);
            match RunResult::load(&path) {
                Ok(result) => Some(RunRecord::new(run, result)),
                Err(e) => {
                    tracing::warn!(corpus, run, error = %e, "successful run artifact unreadable, left out of aggregation");
                    None
                }
            }
        })
        .collect()
}

fn skipped_report(tracker: &ProgressTracker, ctx: &SweepContext<'_>, corpus: &CorpusSpec) -> CorpusReport {
    let report = match tracker.corpus(ctx.system, &corpus.name) {
        Some(progress) => {
            CorpusReport::from_progress(progress, corpus.expected_chunks, CorpusOutcome::SkippedFailed)
        }
        None => CorpusReport::empty(&corpus.name, corpus.expected_chunks, CorpusOutcome::SkippedFailed),
    };
    let path = ctx.layout.aggregated_path(&corpus.name);
    match benchsweep_stats::io::load_aggregated_if_exists(&path) {
        Ok(Some(aggregated)) => report.with_aggregate(path, &aggregated),
        _ => report,
    }
}

fn unfinished_report(
    tracker: &ProgressTracker,
    system: TargetSystem,
    corpus_plan: &CorpusPlan,
) -> CorpusReport {
    let corpus = &corpus_plan.corpus;
    match (&corpus_plan.action, tracker.corpus(system, &corpus.name)) {
        (CorpusAction::Missing, _) => {
            CorpusReport::empty(&corpus.name, corpus.expected_chunks, CorpusOutcome::Missing)
        }
        (CorpusAction::SkipFailed, _) => {
            CorpusReport::empty(&corpus.name, corpus.expected_chunks, CorpusOutcome::SkippedFailed)
        }
        (_, Some(progress)) => CorpusReport::from_progress(
            progress,
            corpus.expected_chunks,
            CorpusOutcome::from_progress(progress.status),
        ),
        (_, None) => {
            CorpusReport::empty(&corpus.name, corpus.expected_chunks, CorpusOutcome::Incomplete)
        }
    }
}

/// Recompute every concluded corpus of an existing sweep from its raw run
/// artifacts, optionally under a different outlier policy.
pub fn reaggregate_sweep(
    layout: &SweepLayout,
    policy: benchsweep_core::OutlierPolicy,
) -> Result<Vec<AggregatedResult>, SweepError> {
    let state = ProgressTracker::load_snapshot(&layout.progress_path())?;
    let mut results = Vec::new();
    for (system, progress) in &state.systems {
        for corpus in &progress.corpora {
            if corpus.status == crate::tracker::CorpusStatus::InProgress {
                tracing::info!(system = %system, corpus = %corpus.name, "corpus not concluded, skipping");
                continue;
            }
            let runs = load_runs(layout, &corpus.name, &corpus.successful_indices());
            let aggregated = aggregate(&corpus.name, progress.sample_size, runs, policy)?;
            save_aggregated(&layout.aggregated_path(&corpus.name), &aggregated)?;
            results.push(aggregated);
        }
    }
    Ok(results)
}
