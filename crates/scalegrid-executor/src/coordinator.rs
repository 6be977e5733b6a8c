//! Coordinator: dispatches an operation across targets.
//!
//! The coordinator does not poll or retry. Every target gets a single
//! attempt bounded by the operation's timeout budget; an expired budget is
//! a failure for that target only.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::backend::LifecycleBackend;
use crate::error::{ExecError, ExecResult};
use crate::outcome::{
    ExecutionMode, FailurePolicy, OperationKind, OperationOutcome, OperationSpec, TargetResult,
};

/// Per-call time budget for each operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "secs")]
    pub create: Duration,
    #[serde(with = "secs")]
    pub start: Duration,
    #[serde(with = "secs")]
    pub stop: Duration,
    #[serde(with = "secs")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            // Cloud provisioning waits for the machine to reach running.
            create: Duration::from_secs(300),
            start: Duration::from_secs(180),
            stop: Duration::from_secs(120),
            delete: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    pub fn budget(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Create => self.create,
            OperationKind::Start => self.start,
            OperationKind::Stop => self.stop,
            OperationKind::Delete => self.delete,
        }
    }
}

/// Serialize a `Duration` as whole seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// Runs operations against instances through a lifecycle backend.
#[derive(Clone)]
pub struct Coordinator {
    backend: Arc<dyn LifecycleBackend>,
    timeouts: Timeouts,
}

impl Coordinator {
    pub fn new(backend: Arc<dyn LifecycleBackend>, timeouts: Timeouts) -> Self {
        Self { backend, timeouts }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Run `op` against every target according to `spec`.
    ///
    /// `op` returns an optional structured detail on success (for creation,
    /// the new instance name). Sequential runs preserve input order and, with
    /// [`FailurePolicy::FailFast`], stop at the first failure. Parallel runs
    /// wait for every dispatched target before returning; results are
    /// reported in input order regardless of completion order.
    pub async fn run<T, F, Fut>(
        &self,
        spec: &OperationSpec,
        targets: Vec<T>,
        op: F,
    ) -> OperationOutcome
    where
        T: ToString,
        F: Fn(T) -> Fut,
        Fut: Future<Output = ExecResult<Option<String>>> + Send + 'static,
    {
        let requested = targets.len();
        let budget = self.timeouts.budget(spec.kind);
        info!(
            operation = %spec.kind,
            mode = ?spec.mode,
            targets = requested,
            "running operation"
        );

        let results = match spec.mode {
            ExecutionMode::Sequential => {
                run_sequential(spec, targets, budget, &op).await
            }
            ExecutionMode::Parallel => run_parallel(spec.kind, targets, budget, &op).await,
        };

        let outcome = OperationOutcome {
            operation: spec.kind,
            mode: spec.mode,
            requested,
            results,
        };
        info!(
            operation = %spec.kind,
            succeeded = outcome.succeeded(),
            failed = outcome.failed(),
            skipped = outcome.skipped(),
            verdict = ?outcome.verdict(),
            "operation finished"
        );
        outcome
    }

    /// Start, stop or delete the named instances through the backend.
    ///
    /// Failures are collected, never fatal to sibling targets.
    pub async fn lifecycle(&self, kind: OperationKind, instances: &[String]) -> OperationOutcome {
        let spec = OperationSpec::lifecycle(kind);
        let backend = self.backend.clone();
        self.run(&spec, instances.to_vec(), move |name: String| {
            let backend = backend.clone();
            async move {
                match kind {
                    OperationKind::Start => backend.start(&name).await?,
                    OperationKind::Stop => backend.stop(&name).await?,
                    OperationKind::Delete => backend.delete(&name).await?,
                    OperationKind::Create => {
                        return Err(ExecError::Backend(
                            "creation is not a lifecycle operation".to_string(),
                        ));
                    }
                }
                Ok(None)
            }
        })
        .await
    }
}

async fn run_sequential<T, F, Fut>(
    spec: &OperationSpec,
    targets: Vec<T>,
    budget: Duration,
    op: &F,
) -> Vec<TargetResult>
where
    T: ToString,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ExecResult<Option<String>>>,
{
    let total = targets.len();
    let mut results = Vec::with_capacity(total);

    for (idx, target) in targets.into_iter().enumerate() {
        let label = target.to_string();
        let result = bounded(spec.kind, &label, budget, op(target)).await;
        let failed = !result.success;
        results.push(result);

        if failed && spec.policy == FailurePolicy::FailFast {
            warn!(
                operation = %spec.kind,
                target = %label,
                completed = idx,
                remaining = total - idx - 1,
                "aborting sequential run after failure"
            );
            break;
        }
    }

    results
}

async fn run_parallel<T, F, Fut>(
    kind: OperationKind,
    targets: Vec<T>,
    budget: Duration,
    op: &F,
) -> Vec<TargetResult>
where
    T: ToString,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ExecResult<Option<String>>> + Send + 'static,
{
    let labels: Vec<String> = targets.iter().map(ToString::to_string).collect();
    let mut slots: Vec<Option<TargetResult>> = vec![None; labels.len()];
    let mut join_set = JoinSet::new();
    let mut task_index = HashMap::new();

    for (idx, target) in targets.into_iter().enumerate() {
        let label = labels[idx].clone();
        let fut = op(target);
        let handle = join_set.spawn(async move { (idx, bounded(kind, &label, budget, fut).await) });
        task_index.insert(handle.id(), idx);
    }

    // Join point: every dispatched task is awaited, none are abandoned.
    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((_, (idx, result))) => slots[idx] = Some(result),
            Err(e) => {
                if let Some(&idx) = task_index.get(&e.id()) {
                    warn!(operation = %kind, target = %labels[idx], error = %e, "task died");
                    slots[idx] = Some(TargetResult::failed(
                        labels[idx].clone(),
                        ExecError::Aborted(e.to_string()).to_string(),
                    ));
                }
            }
        }
    }

    slots
        .into_iter()
        .zip(labels)
        .map(|(slot, label)| {
            slot.unwrap_or_else(|| {
                TargetResult::failed(label, ExecError::Aborted("no result".to_string()).to_string())
            })
        })
        .collect()
}

/// Await one target operation within `budget`.
async fn bounded<Fut>(kind: OperationKind, target: &str, budget: Duration, fut: Fut) -> TargetResult
where
    Fut: Future<Output = ExecResult<Option<String>>>,
{
    let result = match tokio::time::timeout(budget, fut).await {
        Ok(r) => r,
        Err(_) => Err(ExecError::TimedOut {
            operation: kind.to_string(),
            target: target.to_string(),
            budget,
        }),
    };

    match result {
        Ok(detail) => {
            debug!(operation = %kind, %target, ?detail, "target succeeded");
            TargetResult::ok(target, detail)
        }
        Err(e) => {
            warn!(operation = %kind, %target, error = %e, "target failed");
            TargetResult::failed(target, e.to_string())
        }
    }
}
