//! Resume, timeout, and upgrade behavior of whole sweeps.

use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use benchsweep_core::{
    CancellationToken, CorpusSpec, RunResult, SweepError, SweepOptions, TargetSystem, UnitFailure,
    UnitOutcome, WorkUnit,
};
use benchsweep_orchestration::summary::CorpusOutcome;
use benchsweep_orchestration::{
    run_sweep, run_upgrade, NullReporter, ProgressTracker, RunExecutor, SweepContext, SweepLayout,
    SweepSummary,
};
use benchsweep_stats::io::load_aggregated;
use benchsweep_stats::AggregatedResult;

const SYSTEM: TargetSystem = TargetSystem::Milvus;

/// Deterministic benchmark stand-in.
///
/// Each run's result depends only on its corpus and run index, so any
/// execution order that covers the same runs yields the same aggregate.
struct FakeBench<'a> {
    calls: RefCell<Vec<String>>,
    timeout_units: Vec<&'a str>,
    interrupt_at: RefCell<Option<(&'a str, &'a CancellationToken)>>,
    progress: Option<&'a Path>,
}

impl FakeBench<'_> {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            timeout_units: Vec::new(),
            interrupt_at: RefCell::new(None),
            progress: None,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl RunExecutor for FakeBench<'_> {
    fn execute(
        &self,
        unit: &WorkUnit,
        corpus: &CorpusSpec,
        run_dir: &Path,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<UnitOutcome, SweepError> {
        let id = unit.to_string();
        self.calls.borrow_mut().push(id.clone());

        if let Some(path) = self.progress {
            let state = ProgressTracker::load_snapshot(path).unwrap();
            let running = state.running_unit().map(|(_, c, r)| (c.to_string(), r));
            assert_eq!(running, Some((corpus.name.clone(), unit.run_index)));
        }

        let interrupt = matches!(*self.interrupt_at.borrow(), Some((target, _)) if target == id);
        if interrupt {
            if let Some((_, token)) = self.interrupt_at.borrow_mut().take() {
                token.cancel();
            }
            cancel.check_cancelled()?;
        }
        if self.timeout_units.contains(&id.as_str()) {
            return Ok(UnitOutcome::Failed(UnitFailure::TimedOut { after_secs: 7200 }));
        }

        let total = corpus.expected_chunks as f64 / 100.0 + f64::from(unit.run_index % 4);
        let json = format!(
            r#"{{"chunk_count": {chunks},
            "latency_ms": {{"p50": 1.0, "p95": 2.0, "p99": 3.0, "min": 0.5, "max": 4.0}},
            "throughput_qps": 100.0,
            "phases_sec": {{"total": {total}, "parse": 0.5, "embed": 0.5, "insert": 0.5}},
            "resources": {{"cpu_percent": {{"avg": 5.0, "max": 9.0, "min": 1.0}},
            "memory_mb": {{"avg": 5.0, "max": 9.0, "min": 1.0}}}}}}"#,
            chunks = corpus.expected_chunks,
        );
        std::fs::create_dir_all(run_dir).unwrap();
        std::fs::write(run_dir.join("results.json"), &json).unwrap();
        Ok(UnitOutcome::Success(RunResult::from_json_str(&json).unwrap()))
    }
}

struct Workspace {
    dir: TempDir,
    corpora: Vec<CorpusSpec>,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let corpora = [("1k", 5_562), ("baseline", 175)]
            .into_iter()
            .map(|(name, chunks)| {
                let path = dir.path().join("corpora").join(name);
                std::fs::create_dir_all(&path).unwrap();
                std::fs::write(path.join("doc.xml"), "<doc/>").unwrap();
                CorpusSpec::new(name, path, chunks)
            })
            .collect();
        Self { dir, corpora }
    }

    fn layout(&self, n: usize) -> SweepLayout {
        SweepLayout::new(&self.dir.path().join("results"), SYSTEM, n)
    }

    fn options(n: usize) -> SweepOptions {
        SweepOptions {
            sample_size: n,
            ..Default::default()
        }
    }

    fn run(
        &self,
        n: usize,
        bench: &FakeBench<'_>,
        cancel: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let options = Self::options(n);
        let layout = self.layout(n);
        let ctx = SweepContext {
            system: SYSTEM,
            options: &options,
            layout: &layout,
            executor: bench,
            reporter: &NullReporter,
            hook: None,
            cancel,
        };
        run_sweep(&ctx, &self.corpora, &[])
    }

    fn upgrade(
        &self,
        from: usize,
        to: usize,
        bench: &FakeBench<'_>,
    ) -> Result<SweepSummary, SweepError> {
        let options = Self::options(to);
        let layout = self.layout(to);
        let cancel = CancellationToken::new();
        let ctx = SweepContext {
            system: SYSTEM,
            options: &options,
            layout: &layout,
            executor: bench,
            reporter: &NullReporter,
            hook: None,
            cancel: &cancel,
        };
        run_upgrade(&ctx, &self.layout(from), from, &self.corpora, &[])
    }

    fn aggregated(&self, n: usize, corpus: &str) -> AggregatedResult {
        load_aggregated(&self.layout(n).aggregated_path(corpus)).unwrap()
    }
}

#[test]
fn interrupted_sweep_resumes_to_the_same_result() {
    let clean = Workspace::new();
    clean.run(3, &FakeBench::new(), &CancellationToken::new()).unwrap();

    let ws = Workspace::new();
    let cancel = CancellationToken::new();
    let bench = FakeBench::new();
    *bench.interrupt_at.borrow_mut() = Some(("milvus/1k/run_2", &cancel));
    let err = ws.run(3, &bench, &cancel).unwrap_err();
    assert!(matches!(err, SweepError::Cancelled));
    assert_eq!(
        bench.calls(),
        [
            "milvus/baseline/run_1",
            "milvus/baseline/run_2",
            "milvus/baseline/run_3",
            "milvus/1k/run_1",
            "milvus/1k/run_2",
        ]
    );

    let state = ProgressTracker::load_snapshot(&ws.layout(3).progress_path()).unwrap();
    assert_eq!(state.running_unit(), Some(("milvus", "1k", 2)));

    let resumed = FakeBench::new();
    let summary = ws.run(3, &resumed, &CancellationToken::new()).unwrap();
    assert!(summary.completed);
    assert_eq!(resumed.calls(), ["milvus/1k/run_2", "milvus/1k/run_3"]);

    let state = ProgressTracker::load_snapshot(&ws.layout(3).progress_path()).unwrap();
    let progress = state.corpus(SYSTEM, "1k").unwrap();
    assert_eq!(progress.interrupted.len(), 1);
    assert_eq!(progress.successful_runs, 3);

    for corpus in ["baseline", "1k"] {
        assert_eq!(ws.aggregated(3, corpus), clean.aggregated(3, corpus));
    }
}

#[test]
fn finished_sweep_is_not_executed_again() {
    let ws = Workspace::new();
    ws.run(3, &FakeBench::new(), &CancellationToken::new()).unwrap();
    let before = ws.aggregated(3, "1k");

    let again = FakeBench::new();
    let summary = ws.run(3, &again, &CancellationToken::new()).unwrap();
    assert!(again.calls().is_empty());
    assert_eq!(summary.count(CorpusOutcome::Success), 2);
    assert_eq!(ws.aggregated(3, "1k"), before);
}

#[test]
fn timeout_consumes_a_slot_without_blocking_the_sweep() {
    let ws = Workspace::new();
    let mut bench = FakeBench::new();
    bench.timeout_units = vec!["milvus/baseline/run_1"];
    let summary = ws.run(3, &bench, &CancellationToken::new()).unwrap();

    assert_eq!(bench.calls().len(), 6);
    let baseline = &summary.corpora[0];
    assert_eq!(baseline.corpus, "baseline");
    assert_eq!(baseline.status, CorpusOutcome::Success);
    assert_eq!(baseline.successful_runs, 2);
    assert_eq!(baseline.timed_out, 1);
    assert_eq!(ws.aggregated(3, "baseline").n_runs, 2);
    assert_eq!(ws.aggregated(3, "1k").n_runs, 3);
}

#[test]
fn progress_is_durable_before_each_unit_runs() {
    let ws = Workspace::new();
    let progress = ws.layout(3).progress_path();
    let mut bench = FakeBench::new();
    bench.progress = Some(progress.as_path());
    ws.run(3, &bench, &CancellationToken::new()).unwrap();
    assert_eq!(bench.calls().len(), 6);
}

#[test]
fn upgrade_from_three_to_ten_counts_each_run_once() {
    let direct = Workspace::new();
    direct.run(10, &FakeBench::new(), &CancellationToken::new()).unwrap();

    let ws = Workspace::new();
    ws.run(3, &FakeBench::new(), &CancellationToken::new()).unwrap();
    let archived = ws.aggregated(3, "1k");

    let bench = FakeBench::new();
    let summary = ws.upgrade(3, 10, &bench).unwrap();
    assert!(summary.completed);
    let expected: Vec<String> = ["baseline", "1k"]
        .iter()
        .flat_map(|c| (4..=10).map(move |i| format!("milvus/{c}/run_{i}")))
        .collect();
    assert_eq!(bench.calls(), expected);

    let upgraded = ws.aggregated(10, "1k");
    assert_eq!(upgraded.n_runs, 10);
    let indices: Vec<u32> = upgraded.individual_runs.iter().map(|r| r.run_index).collect();
    assert_eq!(indices, (1..=10).collect::<Vec<_>>());
    assert_eq!(upgraded, direct.aggregated(10, "1k"));

    // the archived sweep is left as it was
    assert_eq!(ws.aggregated(3, "1k"), archived);

    // a second upgrade invocation has nothing left to run
    let again = FakeBench::new();
    ws.upgrade(3, 10, &again).unwrap();
    assert!(again.calls().is_empty());
    assert_eq!(ws.aggregated(10, "1k"), upgraded);
}
