//! Error taxonomy shared by every sweep component.

use std::path::PathBuf;

use crate::constants::exit_codes;

/// Error type for sweep orchestration and aggregation.
///
/// Per-unit failures (crash, timeout, malformed result) are normally carried
/// as [`crate::unit::UnitFailure`] values. The matching variants here are the
/// form they take when surfaced as errors, by result validation or by an
/// executor that reports them through `Err`; the sweep driver folds every
/// non-fatal error back into a [`crate::unit::UnitFailure`] with
/// [`crate::unit::UnitFailure::from_error`].
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Unknown system or corpus, or an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The benchmark process exited unsuccessfully.
    #[error("benchmark process crashed: {0}")]
    ProcessCrash(String),

    /// The benchmark process exceeded its wall-clock budget.
    #[error("benchmark timed out after {0}s")]
    Timeout(u64),

    /// The result artifact was present but failed validation.
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// Aggregation could not produce statistics.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Durable state could not be written.
    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The environment prevents any unit from running.
    #[error("setup error: {0}")]
    Setup(String),

    /// The progress state contradicts the requested transition.
    #[error("inconsistent progress state: {0}")]
    State(String),

    /// Sweep was cancelled.
    #[error("sweep cancelled")]
    Cancelled,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SweepError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON error with the path it concerns.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Whether the sweep must stop rather than continue to the next unit.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Persistence { .. }
                | Self::Cancelled
                | Self::Setup(_)
                | Self::State(_)
                | Self::InvalidArgument(_)
        )
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => exit_codes::ERROR_INVALID,
            Self::Persistence { .. } => exit_codes::ERROR_PERSISTENCE,
            Self::Cancelled => exit_codes::ERROR_CANCELED,
            Self::Setup(_)
            | Self::State(_)
            | Self::ProcessCrash(_)
            | Self::Timeout(_)
            | Self::MalformedResult(_)
            | Self::Aggregation(_)
            | Self::Io { .. }
            | Self::Json { .. } => exit_codes::ERROR_SETUP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(SweepError::InvalidArgument("x".into()).exit_code(), 1);
        assert_eq!(SweepError::Setup("no corpus".into()).exit_code(), 2);
        assert_eq!(SweepError::Cancelled.exit_code(), 130);
        let err = SweepError::Persistence {
            path: "p.json".into(),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn persistence_is_fatal_unit_failures_are_not() {
        let err = SweepError::Persistence {
            path: "p.json".into(),
            source: std::io::Error::other("disk full"),
        };
        assert!(err.is_fatal());
        assert!(!SweepError::Timeout(10).is_fatal());
        assert!(!SweepError::MalformedResult("x".into()).is_fatal());
    }

    #[test]
    fn messages_name_the_path() {
        let err = SweepError::io("/tmp/x", std::io::Error::other("boom"));
        assert!(err.to_string().contains("/tmp/x"));
    }
}
