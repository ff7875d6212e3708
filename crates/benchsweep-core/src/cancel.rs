//! Ctrl+C propagation into the sweep loop.
//!
//! The signal handler only flips a flag. The sweep observes it between
//! units, and the executor observes it while waiting on a child process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SweepError;

/// Shared stop request.
///
/// ```
/// use benchsweep_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler = token.clone();
/// handler.cancel();
/// assert!(token.check_cancelled().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Ask the sweep to stop; the unit in flight is abandoned, not recorded.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// `Err(SweepError::Cancelled)` once a stop was requested.
    pub fn check_cancelled(&self) -> Result<(), SweepError> {
        if self.is_cancelled() {
            return Err(SweepError::Cancelled);
        }
        Ok(())
    }
}
