//! Execution error types.

use std::time::Duration;

use thiserror::Error;

/// Why a single target operation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// The backend ran the operation and reported a failure.
    #[error("{0}")]
    Backend(String),

    #[error("{operation} on {target} timed out after {budget:?}")]
    TimedOut {
        operation: String,
        target: String,
        budget: Duration,
    },

    /// The backend's output could not be interpreted.
    #[error("malformed operation result: {0}")]
    MalformedOperationResult(String),

    /// The task running the operation died before producing a result.
    #[error("operation aborted: {0}")]
    Aborted(String),
}

pub type ExecResult<T> = Result<T, ExecError>;
