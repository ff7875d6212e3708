//! # benchsweep-stats
//!
//! Aggregation of repeated benchmark runs: descriptive statistics, outlier
//! flagging, first-order uncertainty propagation for derived rates, and
//! partition-independent merging of aggregated results.

pub mod aggregate;
pub mod io;
pub mod outlier;
pub mod propagation;
pub mod summary;

pub use aggregate::{aggregate, merge, AggregateStatus, AggregatedResult, MetricStatistic, RunRecord};
pub use propagation::{propagate_rate, DerivedStatistic, RateEstimate};
pub use summary::{describe, Summary};
