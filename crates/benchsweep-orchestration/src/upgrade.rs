//! Extending a finished sweep to a larger sample size.
//!
//! Archived runs of the smaller sweep are carried into the larger sweep's
//! directory as imported successes. Only the missing repetitions execute,
//! and each corpus is then aggregated over the union of archived and new
//! raw results.

use std::path::Path;

use benchsweep_core::persist::write_json_atomic;
use benchsweep_core::{CorpusSpec, SweepError};
use benchsweep_stats::io::load_aggregated_if_exists;
use benchsweep_stats::AggregatedResult;

use crate::layout::SweepLayout;
use crate::orchestrator::{run_sweep_with, SweepContext};
use crate::planner::run_range;
use crate::summary::SweepSummary;
use crate::tracker::{CorpusImport, CorpusStatus, ProgressTracker};

/// Upgrade the sweep at `source` (sample size `from`) into `ctx.layout`,
/// whose sample size is `ctx.options.sample_size`.
pub fn run_upgrade(
    ctx: &SweepContext<'_>,
    source: &SweepLayout,
    from: usize,
    available: &[CorpusSpec],
    missing: &[CorpusSpec],
) -> Result<SweepSummary, SweepError> {
    let to = ctx.options.sample_size;
    if to <= from {
        return Err(SweepError::InvalidArgument(format!(
            "target sample size {to} must exceed the archived {from}"
        )));
    }
    if !source.root().is_dir() {
        return Err(SweepError::Setup(format!(
            "no archived sweep at {}",
            source.root().display()
        )));
    }

    let mut tracker = ProgressTracker::open(&ctx.layout.progress_path())?;
    for corpus in available {
        if tracker.corpus(ctx.system, &corpus.name).is_some() {
            tracing::debug!(corpus = %corpus.name, "already part of the upgraded sweep");
            continue;
        }
        let Some(archived) = load_aggregated_if_exists(&source.aggregated_path(&corpus.name))? else {
            tracing::info!(corpus = %corpus.name, "no archived result, running from scratch");
            continue;
        };
        import_archived(ctx, &mut tracker, source, from, &corpus.name, &archived)?;
    }

    run_sweep_with(ctx, &mut tracker, available, missing)
}

fn import_archived(
    ctx: &SweepContext<'_>,
    tracker: &mut ProgressTracker,
    source: &SweepLayout,
    from: usize,
    corpus: &str,
    archived: &AggregatedResult,
) -> Result<(), SweepError> {
    let to = ctx.options.sample_size;
    if !archived.is_success() {
        tracing::warn!(corpus, "archived corpus failed, carried over as failed");
        let import = CorpusImport {
            successful: Vec::new(),
            status: CorpusStatus::Failed,
            new_runs: Vec::new(),
            budget: 0,
        };
        tracker.import_corpus(ctx.system, to, corpus, &import)?;
        return Ok(());
    }

    let mut successful = Vec::with_capacity(archived.individual_runs.len());
    for run in &archived.individual_runs {
        write_json_atomic(&ctx.layout.result_path(corpus, run.run_index), &run.result)?;
        copy_logs(
            &source.run_dir(corpus, run.run_index),
            &ctx.layout.run_dir(corpus, run.run_index),
        );
        successful.push(run.run_index);
    }

    // New indices start after both the archived sample size and the
    // highest archived index.
    let last = archived.last_run_index().unwrap_or(0);
    let first = u32::try_from(from).unwrap_or(u32::MAX).max(last).saturating_add(1);
    let needed = to.saturating_sub(successful.len());
    let new_runs = run_range(first, needed);
    let status = if new_runs.is_empty() {
        CorpusStatus::Completed
    } else {
        CorpusStatus::InProgress
    };
    tracing::info!(
        corpus,
        archived = successful.len(),
        new = new_runs.len(),
        first_new = first,
        "importing archived runs"
    );
    let import = CorpusImport {
        budget: ctx.options.attempt_policy.budget(new_runs.len()),
        successful,
        status,
        new_runs,
    };
    tracker.import_corpus(ctx.system, to, corpus, &import)?;
    Ok(())
}

/// Copy every `benchmark.log*` file. Missing logs are not an error.
fn copy_logs(from: &Path, to: &Path) {
    let Ok(entries) = std::fs::read_dir(from) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with("benchmark.log") {
            continue;
        }
        let copied = std::fs::create_dir_all(to)
            .and_then(|()| std::fs::copy(entry.path(), to.join(&name)));
        if let Err(e) = copied {
            tracing::warn!(path = %entry.path().display(), error = %e, "could not copy archived log");
        }
    }
}
