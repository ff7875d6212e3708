//! # benchsweep-core
//!
//! Data model for repeated benchmark sweeps: target systems, the corpus
//! catalog, work units and their lifecycle, the validated run-result schema,
//! sweep options, and the shared error taxonomy.

pub mod cancel;
pub mod constants;
pub mod corpus;
pub mod error;
pub mod options;
pub mod persist;
pub mod result;
pub mod system;
pub mod unit;

// Re-exports
pub use constants::{exit_codes, DEFAULT_SAMPLE_SIZE, DEFAULT_TIMEOUT_SECS};
pub use corpus::{CorpusCatalog, CorpusSpec};
pub use error::SweepError;
pub use options::{AttemptPolicy, OutlierPolicy, SweepOptions};
pub use cancel::CancellationToken;
pub use result::RunResult;
pub use system::TargetSystem;
pub use unit::{UnitFailure, UnitOutcome, UnitStatus, WorkUnit};

/// Current unix time in whole seconds.
#[must_use]
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
