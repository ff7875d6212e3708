//! Run executor: one unit, one isolated process, one wall-clock budget.
//!
//! The benchmark command is spawned in its own process group with stdout and
//! stderr redirected to a fresh log artifact. A watcher thread owns the child
//! and sends its exit status over a channel; that message is the completion
//! signal the executor blocks on. On timeout or cancellation the whole group
//! is sent SIGTERM, then SIGKILL after a grace period.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use benchsweep_core::constants::artifacts::RESULT_FILE;
use benchsweep_core::constants::{DEFAULT_BENCH_COMMAND, KILL_GRACE_SECS};
use benchsweep_core::{
    unix_now, CancellationToken, CorpusSpec, RunResult, SweepError, UnitFailure, UnitOutcome,
    WorkUnit,
};

use crate::layout::next_log_path;

/// How often a blocked executor checks for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Executes a single work unit.
pub trait RunExecutor {
    /// Run `unit` in `run_dir` within `timeout`.
    ///
    /// Crashes, timeouts, and malformed artifacts come back as
    /// [`UnitOutcome::Failed`]. `Err` is reserved for conditions that must
    /// stop the sweep: cancellation and unwritable run directories.
    fn execute(
        &self,
        unit: &WorkUnit,
        corpus: &CorpusSpec,
        run_dir: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<UnitOutcome, SweepError>;
}

/// Benchmark command line with `{system}`, `{corpus}`, `{corpus_path}`,
/// `{output}` and `{run}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    tokens: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self, SweepError> {
        let tokens: Vec<String> = template.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            return Err(SweepError::InvalidArgument(
                "benchmark command is empty".to_string(),
            ));
        }
        Ok(Self { tokens })
    }

    /// Substitute placeholders token by token, so substituted paths may
    /// contain spaces.
    #[must_use]
    pub fn render(&self, unit: &WorkUnit, corpus: &CorpusSpec, output: &Path) -> Vec<String> {
        let corpus_path = corpus.path.to_string_lossy();
        let output = output.to_string_lossy();
        let run = unit.run_index.to_string();
        self.tokens
            .iter()
            .map(|t| {
                t.replace("{system}", unit.system.as_str())
                    .replace("{corpus_path}", &corpus_path)
                    .replace("{corpus}", &unit.corpus)
                    .replace("{output}", &output)
                    .replace("{run}", &run)
            })
            .collect()
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.tokens[0]
    }
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_BENCH_COMMAND
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// How a watched process ended.
#[derive(Debug)]
pub enum Completion {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// A spawned process group and the channel its exit status arrives on.
pub struct RunningProcess {
    pid: u32,
    done: Receiver<io::Result<ExitStatus>>,
}

impl RunningProcess {
    /// Spawn `command` and hand the child to a watcher thread.
    pub fn spawn(mut command: Command) -> io::Result<Self> {
        let mut child = command.spawn()?;
        let pid = child.id();
        let (tx, done) = crossbeam_channel::bounded(1);
        std::thread::Builder::new()
            .name(format!("benchsweep-wait-{pid}"))
            .spawn(move || {
                let _ = tx.send(child.wait());
            })?;
        Ok(Self { pid, done })
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the process exits, `timeout` elapses, or `cancel` fires.
    ///
    /// In the last two cases the process group is terminated before returning.
    pub fn wait(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
        grace: Duration,
    ) -> io::Result<Completion> {
        // a timeout past the end of the clock means no deadline
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let mut poll = CANCEL_POLL;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    self.terminate(grace);
                    return Ok(Completion::TimedOut);
                }
                poll = poll.min(deadline - now);
            }
            match self.done.recv_timeout(poll) {
                Ok(status) => return status.map(Completion::Exited),
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        self.terminate(grace);
                        return Ok(Completion::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::other("process watcher exited without a status"));
                }
            }
        }
    }

    /// SIGTERM the group, SIGKILL it after `grace`, then reap the child.
    fn terminate(&self, grace: Duration) {
        signal_group(self.pid, false);
        if self.done.recv_timeout(grace).is_ok() {
            return;
        }
        tracing::warn!(pid = self.pid, "process group ignored SIGTERM, killing");
        signal_group(self.pid, true);
        let _ = self.done.recv();
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, force: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Err(e) = killpg(Pid::from_raw(raw), signal) {
        tracing::debug!(pid, ?signal, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn signal_group(pid: u32, _force: bool) {
    // taskkill /T takes the whole tree down; there is no soft stage.
    let _ = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Runs the benchmark as an external command.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    template: CommandTemplate,
    kill_grace: Duration,
}

impl ProcessExecutor {
    #[must_use]
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            kill_grace: Duration::from_secs(KILL_GRACE_SECS),
        }
    }

    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Check that the benchmark program can be found at all.
    pub fn preflight(&self) -> Result<(), SweepError> {
        let program = Path::new(self.template.program());
        let found = if program.components().count() > 1 || program.is_absolute() {
            program.exists()
        } else {
            std::env::var_os("PATH").is_some_and(|paths| {
                std::env::split_paths(&paths).any(|dir| {
                    dir.join(program).is_file() || dir.join(program).with_extension("exe").is_file()
                })
            })
        };
        if found {
            Ok(())
        } else {
            Err(SweepError::Setup(format!(
                "benchmark program '{}' not found",
                program.display()
            )))
        }
    }
}

impl RunExecutor for ProcessExecutor {
    fn execute(
        &self,
        unit: &WorkUnit,
        corpus: &CorpusSpec,
        run_dir: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<UnitOutcome, SweepError> {
        cancel.check_cancelled()?;
        let persist_err = |path: &Path, source: io::Error| SweepError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(run_dir).map_err(|e| persist_err(run_dir, e))?;
        let output = run_dir.join(RESULT_FILE);
        if output.exists() {
            tracing::debug!(unit = %unit, "removing stale result artifact");
            std::fs::remove_file(&output).map_err(|e| persist_err(&output, e))?;
        }

        let argv = self.template.render(unit, corpus, &output);
        let log_path = next_log_path(run_dir);
        let mut log = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&log_path)
            .map_err(|e| persist_err(&log_path, e))?;
        writeln!(
            log,
            "# unit: {unit} (epoch {})\n# command: {}\n# started: unix:{}",
            unit.epoch,
            argv.join(" "),
            unix_now()
        )
        .map_err(|e| persist_err(&log_path, e))?;
        let stderr = log.try_clone().map_err(|e| persist_err(&log_path, e))?;

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(stderr)
            .env("BENCHSWEEP_SYSTEM", unit.system.as_str())
            .env("BENCHSWEEP_CORPUS", &unit.corpus)
            .env("BENCHSWEEP_CORPUS_PATH", &corpus.path)
            .env("BENCHSWEEP_RUN", unit.run_index.to_string())
            .env("BENCHSWEEP_OUTPUT", &output);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        tracing::info!(unit = %unit, log = %log_path.display(), "starting unit");
        let started = Instant::now();
        let process = match RunningProcess::spawn(command) {
            Ok(p) => p,
            Err(e) => {
                append_log(&log_path, &format!("# spawn failed: {e}"));
                return Ok(UnitOutcome::Failed(UnitFailure::ProcessCrashed {
                    exit_code: None,
                    detail: format!("failed to spawn '{}': {e}", argv[0]),
                }));
            }
        };

        let completion = process.wait(timeout, cancel, self.kill_grace);
        let elapsed = started.elapsed().as_secs_f64();
        let outcome = match completion {
            Ok(Completion::Exited(status)) => {
                append_log(
                    &log_path,
                    &format!("# duration: {elapsed:.2}s\n# exit: {status}"),
                );
                classify(status, &output)
            }
            Ok(Completion::TimedOut) => {
                append_log(
                    &log_path,
                    &format!(
                        "# duration: {elapsed:.2}s\n# timed out after {}s, process group killed",
                        timeout.as_secs()
                    ),
                );
                UnitOutcome::Failed(UnitFailure::TimedOut {
                    after_secs: timeout.as_secs(),
                })
            }
            Ok(Completion::Cancelled) => {
                append_log(&log_path, "# cancelled, process group killed");
                tracing::warn!(unit = %unit, "unit cancelled");
                return Err(SweepError::Cancelled);
            }
            Err(e) => UnitOutcome::Failed(UnitFailure::ProcessCrashed {
                exit_code: None,
                detail: format!("lost track of process {}: {e}", process.pid()),
            }),
        };

        match &outcome {
            UnitOutcome::Success(_) => tracing::info!(unit = %unit, elapsed, "unit succeeded"),
            UnitOutcome::Failed(failure) => {
                tracing::warn!(unit = %unit, elapsed, %failure, "unit failed");
            }
        }
        Ok(outcome)
    }
}

fn classify(status: ExitStatus, output: &Path) -> UnitOutcome {
    if !status.success() {
        return UnitOutcome::Failed(UnitFailure::ProcessCrashed {
            exit_code: status.code(),
            detail: status.to_string(),
        });
    }
    match RunResult::load(output) {
        Ok(result) => UnitOutcome::Success(result),
        Err(SweepError::MalformedResult(reason)) => {
            UnitOutcome::Failed(UnitFailure::ResultMalformed { reason })
        }
        Err(e) => UnitOutcome::Failed(UnitFailure::ProcessCrashed {
            exit_code: status.code(),
            detail: format!("no result artifact: {e}"),
        }),
    }
}

fn append_log(path: &Path, text: &str) {
    let written = OpenOptions::new()
        .append(true)
        .open(path)
        .and_then(|mut f: File| writeln!(f, "{text}"));
    if let Err(e) = written {
        tracing::warn!(log = %path.display(), error = %e, "could not append to log");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchsweep_core::TargetSystem;

    fn unit() -> WorkUnit {
        WorkUnit::new(TargetSystem::Chroma, "1k", 2, 1)
    }

    #[test]
    fn template_substitutes_placeholders() {
        let t = CommandTemplate::parse("bench --sys {system} --in {corpus_path} --out {output} -n {run} {corpus}")
            .unwrap();
        let corpus = CorpusSpec::new("1k", "/data/my corpus", 5562);
        let argv = t.render(&unit(), &corpus, Path::new("/r/run_2/results.json"));
        assert_eq!(
            argv,
            [
                "bench",
                "--sys",
                "chroma",
                "--in",
                "/data/my corpus",
                "--out",
                "/r/run_2/results.json",
                "-n",
                "2",
                "1k"
            ]
        );
    }

    #[test]
    fn empty_template_is_invalid() {
        assert!(matches!(
            CommandTemplate::parse("   "),
            Err(SweepError::InvalidArgument(_))
        ));
        assert_eq!(CommandTemplate::default().program(), "python");
    }

    #[test]
    fn preflight_rejects_missing_program() {
        let exec = ProcessExecutor::new(CommandTemplate::parse("/nonexistent/bench-xyz").unwrap());
        assert!(matches!(exec.preflight(), Err(SweepError::Setup(_))));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use tempfile::TempDir;

        const VALID: &str = r#"{"chunk_count": 175,
"latency_ms": {"p50": 1.0, "p95": 2.0, "p99": 3.0, "min": 0.5, "max": 4.0},
"throughput_qps": 50.0,
"phases_sec": {"total": 4.0, "parse": 1.0, "embed": 2.0, "insert": 1.0},
"resources": {"cpu_percent": {"avg": 5.0, "max": 9.0, "min": 1.0},
"memory_mb": {"avg": 5.0, "max": 9.0, "min": 1.0}}}"#;

        struct Fixture {
            dir: TempDir,
            corpus: CorpusSpec,
        }

        impl Fixture {
            fn new() -> Self {
                let dir = TempDir::new().unwrap();
                let corpus = CorpusSpec::new("1k", dir.path(), 175);
                Self { dir, corpus }
            }

            fn executor(&self, script: &str) -> ProcessExecutor {
                let path = self.dir.path().join("bench.sh");
                std::fs::write(&path, script).unwrap();
                let template = format!("sh {} {{output}}", path.display());
                ProcessExecutor::new(CommandTemplate::parse(&template).unwrap())
                    .with_kill_grace(Duration::from_millis(500))
            }

            fn run(&self, exec: &ProcessExecutor, timeout: Duration) -> Result<UnitOutcome, SweepError> {
                let run_dir = self.dir.path().join("run_2");
                exec.execute(&unit(), &self.corpus, &run_dir, timeout, &CancellationToken::new())
            }
        }

        #[test]
        fn successful_run_is_parsed_and_logged() {
            let fx = Fixture::new();
            let script = format!("echo working\ncat > \"$1\" <<'EOF'\n{VALID}\nEOF\n");
            let outcome = fx.run(&fx.executor(&script), Duration::from_secs(30)).unwrap();
            assert!(matches!(outcome, UnitOutcome::Success(ref r) if r.chunk_count == 175));

            let log = std::fs::read_to_string(fx.dir.path().join("run_2/benchmark.log")).unwrap();
            assert!(log.starts_with("# unit: chroma/1k/run_2"));
            assert!(log.contains("working"));
            assert!(log.contains("# exit:"));
        }

        #[test]
        fn nonzero_exit_is_crash() {
            let fx = Fixture::new();
            let outcome = fx.run(&fx.executor("exit 3\n"), Duration::from_secs(30)).unwrap();
            assert!(matches!(
                outcome,
                UnitOutcome::Failed(UnitFailure::ProcessCrashed { exit_code: Some(3), .. })
            ));
        }

        #[test]
        fn clean_exit_without_artifact_is_crash() {
            let fx = Fixture::new();
            let outcome = fx.run(&fx.executor("exit 0\n"), Duration::from_secs(30)).unwrap();
            assert!(matches!(
                outcome,
                UnitOutcome::Failed(UnitFailure::ProcessCrashed { .. })
            ));
        }

        #[test]
        fn invalid_artifact_is_malformed() {
            let fx = Fixture::new();
            let outcome = fx
                .run(&fx.executor("echo '{}' > \"$1\"\n"), Duration::from_secs(30))
                .unwrap();
            assert!(matches!(
                outcome,
                UnitOutcome::Failed(UnitFailure::ResultMalformed { .. })
            ));
        }

        #[test]
        fn timeout_kills_process_group() {
            let fx = Fixture::new();
            let started = Instant::now();
            let outcome = fx
                .run(&fx.executor("sleep 30 &\nsleep 30\n"), Duration::from_millis(300))
                .unwrap();
            assert!(matches!(
                outcome,
                UnitOutcome::Failed(UnitFailure::TimedOut { .. })
            ));
            assert!(started.elapsed() < Duration::from_secs(10));
            let log = std::fs::read_to_string(fx.dir.path().join("run_2/benchmark.log")).unwrap();
            assert!(log.contains("timed out"));
        }

        #[test]
        fn unbounded_timeout_waits_for_exit() {
            let fx = Fixture::new();
            let outcome = fx
                .run(&fx.executor("exit 3\n"), Duration::from_secs(u64::MAX))
                .unwrap();
            assert!(matches!(
                outcome,
                UnitOutcome::Failed(UnitFailure::ProcessCrashed { exit_code: Some(3), .. })
            ));
        }

        #[test]
        fn reexecution_keeps_old_log_and_drops_stale_result() {
            let fx = Fixture::new();
            let script = format!("cat > \"$1\" <<'EOF'\n{VALID}\nEOF\n");
            fx.run(&fx.executor(&script), Duration::from_secs(30)).unwrap();

            let outcome = fx.run(&fx.executor("exit 0\n"), Duration::from_secs(30)).unwrap();
            assert!(matches!(outcome, UnitOutcome::Failed(_)));
            assert!(fx.dir.path().join("run_2/benchmark.log").exists());
            assert!(fx.dir.path().join("run_2/benchmark.log.1").exists());
            assert!(!fx.dir.path().join("run_2/results.json").exists());
        }

        #[test]
        fn cancellation_stops_running_unit() {
            let fx = Fixture::new();
            let exec = fx.executor("sleep 30\n");
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let handle = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                trigger.cancel();
            });
            let run_dir = fx.dir.path().join("run_2");
            let result = exec.execute(&unit(), &fx.corpus, &run_dir, Duration::from_secs(60), &cancel);
            handle.join().unwrap();
            assert!(matches!(result, Err(SweepError::Cancelled)));
        }
    }
}
