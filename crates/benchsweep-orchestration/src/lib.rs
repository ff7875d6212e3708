//! # benchsweep-orchestration
//!
//! Sweep planning, process execution with timeouts, durable progress
//! tracking, and upgrades of finished sweeps to larger sample sizes.

pub mod executor;
pub mod interfaces;
pub mod layout;
pub mod orchestrator;
pub mod planner;
pub mod summary;
pub mod tracker;
pub mod upgrade;

pub use executor::{CommandTemplate, ProcessExecutor, RunExecutor};
pub use interfaces::{CommandHook, CompletionHook, NullReporter, SweepReporter};
pub use layout::SweepLayout;
pub use orchestrator::{partition_available, reaggregate_sweep, run_sweep, SweepContext};
pub use planner::{SweepPlan, SweepPlanner};
pub use summary::{CorpusOutcome, CorpusReport, SweepSummary};
pub use tracker::{ProgressState, ProgressTracker};
pub use upgrade::run_upgrade;
