//! UI helpers for CLI display.

use console::{style, StyledObject};

use benchsweep_core::UnitStatus;
use benchsweep_orchestration::CorpusOutcome;

/// Check if color output is disabled via `NO_COLOR` env var.
#[must_use]
pub fn is_color_disabled() -> bool {
    std::env::var_os("NO_COLOR").is_some()
}

fn styled<D>(value: D) -> StyledObject<D> {
    let s = style(value);
    if is_color_disabled() {
        s.force_styling(false)
    } else {
        s
    }
}

/// Print a styled header.
pub fn print_header(text: &str) {
    println!("{}", styled(format!("=== {text} ===")).bold().cyan());
}

pub fn print_success(text: &str) {
    println!("{} {text}", styled("[OK]").green().bold());
}

pub fn print_warning(text: &str) {
    eprintln!("{} {text}", styled("[WARN]").yellow().bold());
}

pub fn print_error(text: &str) {
    eprintln!("{} {text}", styled("[ERROR]").red().bold());
}

/// Status label of a finished unit.
#[must_use]
pub fn unit_status_label(status: UnitStatus) -> String {
    let label = status.as_str().to_uppercase();
    match status {
        UnitStatus::Success => styled(label).green().to_string(),
        UnitStatus::TimedOut => styled(label).yellow().to_string(),
        UnitStatus::Failed => styled(label).red().to_string(),
        UnitStatus::Pending | UnitStatus::Running => label,
    }
}

/// Status label of a corpus, padded to `width` before styling.
#[must_use]
pub fn corpus_status_label(outcome: CorpusOutcome, width: usize) -> String {
    let label = format!("{:<width$}", outcome.as_str());
    match outcome {
        CorpusOutcome::Success => styled(label).green().to_string(),
        CorpusOutcome::Failed => styled(label).red().to_string(),
        CorpusOutcome::SkippedFailed | CorpusOutcome::Incomplete => {
            styled(label).yellow().to_string()
        }
        CorpusOutcome::Missing => styled(label).dim().to_string(),
    }
}
