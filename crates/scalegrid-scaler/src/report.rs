//! Structured result of one scale request.

use serde::{Deserialize, Serialize};

use scalegrid_executor::OperationOutcome;

use crate::operation::{Direction, ScalePhase};

/// Exactly one report is produced per scale request.
///
/// Partial completion is distinguishable from total failure through
/// `completed` against `requested`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleReport {
    pub direction: Direction,
    pub group: String,
    pub phase: ScalePhase,
    pub success: bool,
    pub message: String,
    pub requested: u32,
    pub completed: u32,
    /// Instances created (scale-up) or selected for removal (scale-down).
    #[serde(default)]
    pub instances: Vec<String>,
    /// Sub-operation outcomes in the order they ran.
    #[serde(default)]
    pub sub_reports: Vec<OperationOutcome>,
    /// Cause chain, outermost first.
    #[serde(default)]
    pub failure_causes: Vec<String>,
}

impl ScaleReport {
    /// A request rejected before any side effect.
    pub fn cancelled(direction: Direction, group: &str, requested: u32, cause: String) -> Self {
        Self {
            direction,
            group: group.to_string(),
            phase: ScalePhase::ValidationFailed,
            success: false,
            message: format!(
                "{} operation cancelled: an error was encountered during validation",
                direction.label()
            ),
            requested,
            completed: 0,
            instances: Vec::new(),
            sub_reports: Vec::new(),
            failure_causes: vec![cause],
        }
    }

    /// A request that broke off during execution.
    pub fn partial(
        direction: Direction,
        group: &str,
        requested: u32,
        instances: Vec<String>,
        sub_reports: Vec<OperationOutcome>,
        failure_causes: Vec<String>,
    ) -> Self {
        let completed = instances.len() as u32;
        Self {
            direction,
            group: group.to_string(),
            phase: ScalePhase::PartialFailure,
            success: false,
            message: completed_message(completed, requested),
            requested,
            completed,
            instances,
            sub_reports,
            failure_causes,
        }
    }

    /// A request that hit a store or internal error.
    pub fn failed(
        direction: Direction,
        group: &str,
        phase: ScalePhase,
        requested: u32,
        cause: String,
    ) -> Self {
        Self {
            direction,
            group: group.to_string(),
            phase,
            success: false,
            message: format!("{} operation failed: {cause}", direction.label()),
            requested,
            completed: 0,
            instances: Vec::new(),
            sub_reports: Vec::new(),
            failure_causes: vec![cause],
        }
    }
}

/// "N of M instances completed".
pub fn completed_message(completed: u32, requested: u32) -> String {
    format!("{completed} of {requested} instances completed")
}
