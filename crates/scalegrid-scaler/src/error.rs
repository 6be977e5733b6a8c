//! Scaler error types.

use thiserror::Error;

use scalegrid_placement::BalanceError;
use scalegrid_state::{ProviderKind, StateError};

/// A scale request that must be rejected before anything is changed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Scaling Group {0} does not exist")]
    UnknownScalingGroup(String),

    #[error("quantity must be at least 1, got {0}")]
    QuantityTooSmall(u32),

    #[error("quantity {quantity} exceeds the maximum scale of {ceiling}")]
    QuantityAboveCeiling { quantity: u32, ceiling: u32 },

    #[error("minimum instances ({min}) is greater than maximum instances ({max})")]
    InconsistentBounds { min: u32, max: u32 },

    #[error("Deployment Group {0} does not exist")]
    UnknownDeploymentGroup(String),

    /// No provider is registered for the group's kind.
    #[error("Scaling Group {group} is not a {expected} Scaling Group")]
    ProviderMismatch {
        group: String,
        kind: ProviderKind,
        expected: String,
    },

    #[error("Scaling Group {0} has no configured nodes")]
    NoNodes(String),

    #[error("Scaling Group {0} references a blank node name")]
    BlankNodeRef(String),

    #[error("Node {0} does not exist")]
    UnknownNode(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Unknown instance type: {0}")]
    UnknownInstanceType(String),

    #[error("{0} must not be blank")]
    Blank(&'static str),
}

/// Scaler-level failure.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A tracker invariant or phase transition was violated.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl From<BalanceError> for ScaleError {
    fn from(e: BalanceError) -> Self {
        ScaleError::Internal(e.to_string())
    }
}

pub type ScaleResult<T> = Result<T, ScaleError>;
