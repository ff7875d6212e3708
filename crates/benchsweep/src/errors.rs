//! Exit-code mapping for top-level errors.

use benchsweep_core::exit_codes;
use benchsweep_core::SweepError;

/// Exit code for an error returned by [`crate::app::run`].
///
/// The first [`SweepError`] in the chain decides; anything else is treated
/// as an environment failure.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<SweepError>())
        .map_or(exit_codes::ERROR_SETUP, SweepError::exit_code)
}
