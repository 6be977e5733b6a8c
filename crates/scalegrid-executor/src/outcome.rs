//! Operation descriptors and aggregated outcomes.

use serde::{Deserialize, Serialize};

/// How targets of one operation are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All targets at once; completion order is unspecified.
    Parallel,
    /// One target at a time, in input order.
    Sequential,
}

/// What to do when a target fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure (sequential mode only).
    FailFast,
    /// Record the failure and carry on with the remaining targets.
    Continue,
}

/// The remote operations the scaler issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Start,
    Stop,
    Delete,
}

impl OperationKind {
    /// Whether the operation writes shared registration state, which
    /// cannot tolerate concurrent writers.
    pub fn mutates_shared_state(self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Delete)
    }

    /// Dispatch mode implied by the operation's safety.
    pub fn default_mode(self) -> ExecutionMode {
        if self.mutates_shared_state() {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create-instance",
            OperationKind::Start => "start-instance",
            OperationKind::Stop => "stop-instance",
            OperationKind::Delete => "delete-instance",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named operation plus how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub mode: ExecutionMode,
    pub policy: FailurePolicy,
}

impl OperationSpec {
    /// Instance creation: sequential, abort on first failure.
    pub fn create() -> Self {
        Self {
            kind: OperationKind::Create,
            mode: ExecutionMode::Sequential,
            policy: FailurePolicy::FailFast,
        }
    }

    /// Start/stop/delete: mode from the operation's safety, failures collected.
    pub fn lifecycle(kind: OperationKind) -> Self {
        Self {
            kind,
            mode: kind.default_mode(),
            policy: FailurePolicy::Continue,
        }
    }
}

/// Result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    pub target: String,
    pub success: bool,
    /// Structured output on success, e.g. the created instance name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl TargetResult {
    pub fn ok(target: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            target: target.into(),
            success: true,
            detail,
            cause: None,
        }
    }

    pub fn failed(target: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            success: false,
            detail: None,
            cause: Some(cause.into()),
        }
    }
}

/// Aggregate verdict of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every requested target succeeded.
    Success,
    /// Some targets succeeded, others failed or were never attempted.
    PartialFailure,
    /// Nothing succeeded.
    Failure,
}

/// Everything that happened during one coordinator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: OperationKind,
    pub mode: ExecutionMode,
    /// Number of targets handed to the coordinator.
    pub requested: usize,
    /// Results in input order. Shorter than `requested` after a fail-fast abort.
    pub results: Vec<TargetResult>,
}

impl OperationOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Targets never attempted because of a fail-fast abort.
    pub fn skipped(&self) -> usize {
        self.requested - self.results.len()
    }

    pub fn verdict(&self) -> Verdict {
        let ok = self.succeeded();
        if ok == self.requested {
            Verdict::Success
        } else if ok == 0 {
            Verdict::Failure
        } else {
            Verdict::PartialFailure
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict() == Verdict::Success
    }

    /// Details of successful targets, in input order.
    pub fn details(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.detail.clone())
            .collect()
    }

    /// Targets that succeeded, in input order.
    pub fn succeeded_targets(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.target.clone())
            .collect()
    }

    /// Causes of failed targets, formatted as `target: cause`.
    pub fn failure_causes(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.target,
                    r.cause.as_deref().unwrap_or("unknown failure")
                )
            })
            .collect()
    }
}
