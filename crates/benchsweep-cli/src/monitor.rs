//! Read-only view of a sweep in progress.
//!
//! Every refresh reads the progress artifact anew. Nothing here writes to
//! the sweep directory.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use console::Term;

use benchsweep_core::{CancellationToken, SweepError};
use benchsweep_orchestration::SweepLayout;
use benchsweep_orchestration::ProgressTracker;

use crate::output::format_duration;

/// One rendering of the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorView {
    pub sweep_dir: PathBuf,
    pub finished: usize,
    pub total: usize,
    /// `system/corpus/run_i` of the unit recorded as running.
    pub running: Option<String>,
    pub log_path: Option<PathBuf>,
    pub log_tail: Vec<String>,
    pub remaining: Option<Duration>,
}

impl MonitorView {
    /// Read the current state of the sweep at `layout`.
    pub fn capture(layout: &SweepLayout, lines: usize) -> Result<Self, SweepError> {
        let progress_path = layout.progress_path();
        if !progress_path.exists() {
            return Err(SweepError::Setup(format!(
                "no progress artifact at {}",
                progress_path.display()
            )));
        }
        let state = ProgressTracker::load_snapshot(&progress_path)?;
        let (running, log_path) = match state.running_unit() {
            Some((system, corpus, run)) => (
                Some(format!("{system}/{corpus}/run_{run}")),
                layout.latest_log(corpus, run),
            ),
            None => (None, None),
        };
        let log_tail = log_path
            .as_deref()
            .map(|p| tail_lines(p, lines))
            .unwrap_or_default();
        Ok(Self {
            sweep_dir: layout.root().to_path_buf(),
            finished: state.finished_units(),
            total: state.total_units(),
            running,
            log_path,
            log_tail,
            remaining: state.estimate_remaining(),
        })
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "sweep {}\nunits {}/{} done\n",
            self.sweep_dir.display(),
            self.finished,
            self.total
        );
        match &self.running {
            Some(unit) => out.push_str(&format!("running {unit}\n")),
            None => out.push_str("no unit running\n"),
        }
        if let Some(eta) = self.remaining {
            out.push_str(&format!("estimated remaining {}\n", format_duration(eta)));
        }
        if let Some(path) = &self.log_path {
            out.push_str(&format!("--- {} ---\n", path.display()));
            for line in &self.log_tail {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

/// Last `k` lines of a text file. Unreadable files yield nothing.
#[must_use]
pub fn tail_lines(path: &Path, k: usize) -> Vec<String> {
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    let mut tail = std::collections::VecDeque::with_capacity(k + 1);
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        tail.push_back(line);
        if tail.len() > k {
            tail.pop_front();
        }
    }
    tail.into()
}

/// Print the view once, or every `interval` until cancelled.
pub fn watch(
    layout: &SweepLayout,
    lines: usize,
    interval: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<(), SweepError> {
    let term = Term::stdout();
    loop {
        let view = MonitorView::capture(layout, lines)?;
        tracing::debug!(finished = view.finished, total = view.total, "monitor refresh");
        let Some(every) = interval else {
            print!("{}", view.render());
            return Ok(());
        };
        if term.is_term() {
            let _ = term.clear_screen();
        }
        print!("{}", view.render());
        let mut slept = Duration::ZERO;
        while slept < every {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let step = Duration::from_millis(200).min(every - slept);
            std::thread::sleep(step);
            slept += step;
        }
    }
}
