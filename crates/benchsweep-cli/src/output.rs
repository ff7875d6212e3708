//! Text formatting for sweep output.

use std::time::Duration;

/// Format a duration for display.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        let rest = secs - (mins as f64 * 60.0);
        format!("{mins}m{rest:02.0}s")
    } else {
        let total = secs as u64;
        format!("{}h{:02}m", total / 3600, (total % 3600) / 60)
    }
}

/// Format a number with thousand separators.
#[must_use]
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// `mean ± std (CV%, n)` with precision chosen by magnitude.
#[must_use]
pub fn format_stat(mean: f64, std: f64, cv_percent: f64, n: usize) -> String {
    let precision = match mean.abs() {
        m if m >= 100.0 => 1,
        m if m >= 1.0 => 2,
        _ => 4,
    };
    format!("{mean:.precision$} ± {std:.precision$} ({cv_percent:.1}%, n={n})")
}

/// Fixed-width cell, truncated with an ellipsis when too long.
#[must_use]
pub fn cell(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        format!("{text:<width$}")
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
