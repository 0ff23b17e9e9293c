//! Error taxonomy for a benchmark run

use thiserror::Error;

/// Result type alias for benchmarker operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors produced while driving and validating the target service.
///
/// Only [`BenchError::Fatal`] aborts the run; everything else is logged,
/// penalized by the scheduler and tolerated. Empty resource pools are not
/// errors at all — checkouts return `None` and the scenario iteration is
/// skipped. Invariant violations inside the shadow model itself panic,
/// since continuing would corrupt every later check.
#[derive(Error, Debug, Clone)]
pub enum BenchError {
    /// The server response violates an invariant that no benign race can
    /// explain. Aborts the whole run with score 0.
    #[error("{0}")]
    Fatal(String),

    /// A single scenario iteration failed (unexpected status code, transport
    /// error) without breaking a cross-checked invariant.
    #[error("{0}")]
    Unexpected(String),

    /// The request exceeded its per-action deadline. The outcome on the
    /// server is unknown; speculative counters are kept, never reverted.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Harness-side failure unrelated to the target (I/O, bad fixtures).
    #[error("internal error: {0}")]
    Internal(String),
}

impl BenchError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Whether this error must abort the entire run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<std::io::Error> for BenchError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BenchError::fatal("remains out of range").is_fatal());
        assert!(!BenchError::unexpected("status 500").is_fatal());
        assert!(!BenchError::Timeout("POST /api/users".into()).is_fatal());
    }

    #[test]
    fn test_timeout_renders_the_action() {
        let err = BenchError::Timeout("POST /api/users".into());
        assert!(err.to_string().contains("POST /api/users"));
    }
}
