//! # benchsweep-cli
//!
//! Terminal presentation of sweeps: progress display, summary tables, the
//! read-only monitor, and shell completion.

pub mod completion;
pub mod monitor;
pub mod output;
pub mod presenter;
pub mod ui;

pub use presenter::{print_summary, CliSweepReporter};
