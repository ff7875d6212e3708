//! Progress bar reporter and summary table.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use benchsweep_core::{TargetSystem, UnitFailure, UnitStatus, WorkUnit};
use benchsweep_orchestration::summary::headline_metrics;
use benchsweep_orchestration::{CorpusReport, SweepReporter, SweepSummary};

use crate::output::{cell, format_duration, format_number, format_stat};
use crate::ui::{corpus_status_label, print_header, unit_status_label};

const BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}";

/// Reports sweep progress on the terminal.
pub struct CliSweepReporter {
    bar: ProgressBar,
    quiet: bool,
}

impl CliSweepReporter {
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(0)
        };
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style);
        }
        Self { bar, quiet }
    }

    fn line(&self, text: &str) {
        if !self.quiet {
            self.bar.println(text);
        }
    }
}

impl SweepReporter for CliSweepReporter {
    fn sweep_started(&self, system: TargetSystem, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        if !self.quiet {
            print_header(&format!("{system}: {total} unit(s) queued"));
        }
        self.bar.enable_steady_tick(Duration::from_millis(250));
    }

    fn unit_started(&self, unit: &WorkUnit, position: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(position.saturating_sub(1) as u64);
        self.bar.set_message(unit.to_string());
    }

    fn unit_finished(
        &self,
        unit: &WorkUnit,
        status: UnitStatus,
        failure: Option<&UnitFailure>,
        duration: Duration,
        remaining: Option<Duration>,
    ) {
        self.bar.inc(1);
        let mut text = format!(
            "{unit} {} in {}",
            unit_status_label(status),
            format_duration(duration)
        );
        if let Some(failure) = failure {
            text.push_str(&format!(" ({failure})"));
        }
        self.line(&text);
        match remaining {
            Some(eta) => self.bar.set_message(format!("eta {}", format_duration(eta))),
            None => self.bar.set_message(String::new()),
        }
    }

    fn corpus_reported(&self, report: &CorpusReport) {
        self.line(&format!(
            "corpus {}: {} ({}/{} successful)",
            report.corpus,
            report.status.as_str(),
            report.successful_runs,
            report.attempts
        ));
    }

    fn sweep_finished(&self, summary: &SweepSummary) {
        self.bar.finish_and_clear();
        if !self.quiet {
            print_summary(summary);
        }
    }
}

/// Render the summary as a table.
#[must_use]
pub fn render_summary(summary: &SweepSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "system {} | n={} | outliers {} | host {} ({} cores, {} MB)\n",
        summary.system,
        summary.requested_sample_size,
        summary.outlier_policy,
        summary.host.cpu_model,
        summary.host.logical_cores,
        format_number(summary.host.total_memory_mb)
    ));
    out.push_str(&format!(
        "{} {} {:>12} {:>5} {:>5} {:>4} {:>4}\n",
        cell("corpus", 10),
        cell("status", 15),
        "chunks",
        "ok",
        "tries",
        "fail",
        "t/o"
    ));
    out.push_str(&format!("{:-<62}\n", ""));
    for report in &summary.corpora {
        out.push_str(&format!(
            "{} {} {:>12} {:>5} {:>5} {:>4} {:>4}\n",
            cell(&report.corpus, 10),
            corpus_status_label(report.status, 15),
            format_number(report.expected_chunks),
            report.successful_runs,
            report.attempts,
            report.failed,
            report.timed_out
        ));
        for name in headline_metrics() {
            if let Some(s) = report.headline.get(&name) {
                out.push_str(&format!(
                    "    {} {}\n",
                    cell(&name, 26),
                    format_stat(s.mean, s.std, s.cv_percent, s.n)
                ));
            }
        }
    }
    if !summary.completed {
        out.push_str("sweep stopped before every corpus concluded\n");
    }
    out
}

pub fn print_summary(summary: &SweepSummary) {
    print!("{}", render_summary(summary));
}
