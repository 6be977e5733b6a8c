//! Scale operation phases.
//!
//! ```text
//! Idle → Validating ─┬→ ValidationFailed
//!                    └→ Placing → Executing ─┬→ PartialFailure
//!                                            └→ Completed
//! ```
//!
//! Terminal phases accept no further transitions. A failed operation is
//! never retried; the caller has to submit a new request.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ScaleError, ScaleResult};

/// Direction of a scale request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Human-readable label used in report messages.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "Scale up",
            Direction::Down => "Scale down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalePhase {
    Idle,
    Validating,
    ValidationFailed,
    Placing,
    Executing,
    PartialFailure,
    Completed,
}

impl ScalePhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScalePhase::ValidationFailed | ScalePhase::PartialFailure | ScalePhase::Completed
        )
    }

    fn can_advance_to(self, next: ScalePhase) -> bool {
        use ScalePhase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, ValidationFailed)
                | (Validating, Placing)
                | (Placing, Executing)
                | (Executing, Placing)
                | (Executing, PartialFailure)
                | (Executing, Completed)
        )
    }
}

/// One scale request in flight.
#[derive(Debug, Clone)]
pub struct ScaleOperation {
    pub group: String,
    pub direction: Direction,
    pub quantity: u32,
    phase: ScalePhase,
}

impl ScaleOperation {
    pub fn new(group: &str, direction: Direction, quantity: u32) -> Self {
        Self {
            group: group.to_string(),
            direction,
            quantity,
            phase: ScalePhase::Idle,
        }
    }

    pub fn phase(&self) -> ScalePhase {
        self.phase
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn advance(&mut self, next: ScalePhase) -> ScaleResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(ScaleError::Internal(format!(
                "illegal phase transition {:?} -> {:?} for scaling group {}",
                self.phase, next, self.group
            )));
        }
        match next {
            ScalePhase::ValidationFailed | ScalePhase::PartialFailure => {
                warn!(
                    group = %self.group,
                    direction = %self.direction,
                    from = ?self.phase,
                    to = ?next,
                    "scale operation failed"
                );
            }
            ScalePhase::Completed => {
                info!(
                    group = %self.group,
                    direction = %self.direction,
                    quantity = self.quantity,
                    "scale operation completed"
                );
            }
            _ => {
                debug!(group = %self.group, from = ?self.phase, to = ?next, "phase transition");
            }
        }
        self.phase = next;
        Ok(())
    }
}
