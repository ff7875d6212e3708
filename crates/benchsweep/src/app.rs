//! Application entry point and dispatch.

use std::time::Duration;

use anyhow::{Context, Result};

use benchsweep_cli::monitor;
use benchsweep_cli::output::format_stat;
use benchsweep_cli::presenter::CliSweepReporter;
use benchsweep_cli::ui::{print_header, print_success, print_warning};
use benchsweep_core::{CancellationToken, CorpusCatalog, CorpusSpec, SweepError, SweepOptions};
use benchsweep_orchestration::{
    partition_available, reaggregate_sweep, run_sweep, run_upgrade, CommandHook, CommandTemplate,
    CompletionHook, CorpusOutcome, ProcessExecutor, SweepContext, SweepLayout, SweepSummary,
};
use benchsweep_stats::AggregatedResult;

use crate::config::{
    outlier_policy, AggregateArgs, AppConfig, Commands, MonitorArgs, RunArgs, SweepArgs,
    UpgradeArgs,
};
use crate::version::full_version;

/// Run the application.
pub fn run(config: &AppConfig) -> Result<()> {
    tracing::debug!(version = %full_version(), "starting");
    match &config.command {
        Commands::Completion { shell } => {
            let mut cmd = <AppConfig as clap::CommandFactory>::command();
            benchsweep_cli::completion::generate_completion(&mut cmd, *shell, &mut std::io::stdout());
            Ok(())
        }
        Commands::Run(args) => run_command(config, args),
        Commands::Upgrade(args) => upgrade_command(config, args),
        Commands::Aggregate(args) => aggregate_command(config, args),
        Commands::Monitor(args) => monitor_command(args),
    }
}

/// Everything resolved from the shared sweep flags.
struct Prepared {
    options: SweepOptions,
    available: Vec<CorpusSpec>,
    missing: Vec<CorpusSpec>,
    executor: ProcessExecutor,
    hook: Option<CommandHook>,
}

fn prepare(args: &SweepArgs, sample_size: usize) -> Result<Prepared, SweepError> {
    let options = args.options(sample_size)?;

    let catalog = match &args.catalog {
        Some(path) => CorpusCatalog::load(path)?,
        None => CorpusCatalog::default(),
    };
    let catalog = match &args.corpus_root {
        Some(root) => catalog.with_root(root),
        None => catalog,
    };
    let (available, missing) = partition_available(catalog.select(&args.corpora)?);
    if available.is_empty() {
        return Err(SweepError::Setup(
            "none of the selected corpora has documents on disk".to_string(),
        ));
    }

    let executor = ProcessExecutor::new(CommandTemplate::parse(&args.bench_cmd)?);
    executor.preflight()?;

    Ok(Prepared {
        options,
        available,
        missing,
        executor,
        hook: args.on_complete.as_deref().map(CommandHook::new),
    })
}

fn cancellation() -> Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("installing Ctrl+C handler")?;
    Ok(cancel)
}

fn run_command(config: &AppConfig, args: &RunArgs) -> Result<()> {
    let prepared = prepare(&args.sweep, args.runs)?;
    let layout = SweepLayout::new(&args.sweep.results_dir, args.sweep.system, args.runs);
    let cancel = cancellation()?;
    let reporter = CliSweepReporter::new(config.quiet);
    let ctx = context(&args.sweep, &prepared, &layout, &reporter, &cancel);

    let summary = run_sweep(&ctx, &prepared.available, &prepared.missing)?;
    report_outcome(config, &summary, &layout);
    Ok(())
}

fn upgrade_command(config: &AppConfig, args: &UpgradeArgs) -> Result<()> {
    let prepared = prepare(&args.sweep, args.to)?;
    let source = SweepLayout::new(&args.sweep.results_dir, args.sweep.system, args.from);
    let layout = SweepLayout::new(&args.sweep.results_dir, args.sweep.system, args.to);
    let cancel = cancellation()?;
    let reporter = CliSweepReporter::new(config.quiet);
    let ctx = context(&args.sweep, &prepared, &layout, &reporter, &cancel);

    let summary = run_upgrade(&ctx, &source, args.from, &prepared.available, &prepared.missing)?;
    report_outcome(config, &summary, &layout);
    Ok(())
}

fn context<'a>(
    args: &SweepArgs,
    prepared: &'a Prepared,
    layout: &'a SweepLayout,
    reporter: &'a CliSweepReporter,
    cancel: &'a CancellationToken,
) -> SweepContext<'a> {
    SweepContext {
        system: args.system,
        options: &prepared.options,
        layout,
        executor: &prepared.executor,
        reporter,
        hook: prepared.hook.as_ref().map(|h| h as &dyn CompletionHook),
        cancel,
    }
}

fn report_outcome(config: &AppConfig, summary: &SweepSummary, layout: &SweepLayout) {
    if config.quiet {
        return;
    }
    let failed = summary.count(CorpusOutcome::Failed) + summary.count(CorpusOutcome::SkippedFailed);
    if failed > 0 {
        print_warning(&format!(
            "{failed} corpus/corpora failed; see {}",
            layout.summary_path().display()
        ));
    } else {
        print_success(&format!("sweep written to {}", layout.root().display()));
    }
}

fn aggregate_command(config: &AppConfig, args: &AggregateArgs) -> Result<()> {
    let policy = outlier_policy(&args.outliers, args.outlier_threshold)?;
    let layout = SweepLayout::at(&args.dir);
    let results = reaggregate_sweep(&layout, policy)
        .with_context(|| format!("re-aggregating {}", args.dir.display()))?;
    if !config.quiet {
        print_header(&format!("{} ({policy})", args.dir.display()));
        for result in &results {
            println!("{}", aggregate_line(result));
        }
    }
    Ok(())
}

fn aggregate_line(result: &AggregatedResult) -> String {
    let Some(stat) = result.statistic("phase.total_s") else {
        return format!("{:<10} failed", result.corpus);
    };
    let excluded = if stat.excluded.is_empty() {
        String::new()
    } else {
        format!(" excluded runs {:?}", stat.excluded)
    };
    format!(
        "{:<10} total {}{excluded}",
        result.corpus,
        format_stat(stat.mean, stat.std, stat.cv_percent, stat.used)
    )
}

fn monitor_command(args: &MonitorArgs) -> Result<()> {
    let layout = SweepLayout::at(&args.dir);
    let interval = args.watch.map(Duration::from_secs);
    let cancel = if interval.is_some() {
        cancellation()?
    } else {
        CancellationToken::new()
    };
    monitor::watch(&layout, args.lines, interval, &cancel)?;
    Ok(())
}
