//! Scaler: drives one scale request from validation to report.
//!
//! Scale-up places and creates instances one at a time, updating the
//! node balance after each creation, then starts everything it created in
//! parallel. Scale-down selects instances to remove, stops them in
//! parallel, then deletes the stopped ones sequentially.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use scalegrid_executor::{Coordinator, OperationKind, OperationOutcome, OperationSpec};
use scalegrid_placement::{NodeBalance, pick_growth_target, select_for_removal};
use scalegrid_state::{ConfigStore, ProviderKind, ScalingGroup};

use crate::error::{ScaleError, ScaleResult, ValidationError};
use crate::operation::{Direction, ScaleOperation, ScalePhase};
use crate::provider::{CreateTarget, Provider};
use crate::report::{ScaleReport, completed_message};
use crate::settings::ScalerSettings;
use crate::validate::validate;

pub struct Scaler {
    store: Arc<dyn ConfigStore>,
    coordinator: Coordinator,
    settings: ScalerSettings,
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    /// One lock per scaling group with a request in flight; requests
    /// against the same group queue. Entries go away once unused.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Scaler {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        coordinator: Coordinator,
        settings: ScalerSettings,
    ) -> Self {
        Self {
            store,
            coordinator,
            settings,
            providers: HashMap::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register the provider handling groups of its kind.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub async fn scale_up(&self, group: &str, quantity: u32) -> ScaleReport {
        self.scale(group, Direction::Up, quantity).await
    }

    pub async fn scale_down(&self, group: &str, quantity: u32) -> ScaleReport {
        self.scale(group, Direction::Down, quantity).await
    }

    /// Run one scale request. Always yields exactly one report.
    pub async fn scale(&self, group: &str, direction: Direction, quantity: u32) -> ScaleReport {
        let lock = self.group_lock(group).await;
        let guard = lock.lock().await;

        info!(group, %direction, quantity, "scale request received");
        let mut op = ScaleOperation::new(group, direction, quantity);
        let report = match self.execute(&mut op).await {
            Ok(report) => report,
            Err(e) => {
                error!(group, %direction, phase = ?op.phase(), error = %e, "scale operation aborted");
                ScaleReport::failed(direction, group, op.phase(), quantity, e.to_string())
            }
        };

        drop(guard);
        drop(lock);
        self.release_lock(group).await;
        report
    }

    async fn group_lock(&self, group: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(group.to_string()).or_default().clone()
    }

    /// Forget the group's lock unless another request still holds a handle.
    async fn release_lock(&self, group: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(group).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(group);
        }
    }

    async fn execute(&self, op: &mut ScaleOperation) -> ScaleResult<ScaleReport> {
        op.advance(ScalePhase::Validating)?;
        let (group, provider) = match self.validated(op) {
            Ok(found) => found,
            Err(ScaleError::Validation(e)) => {
                warn!(group = %op.group, error = %e, "validation failed");
                op.advance(ScalePhase::ValidationFailed)?;
                return Ok(ScaleReport::cancelled(
                    op.direction,
                    &op.group,
                    op.quantity,
                    e.to_string(),
                ));
            }
            Err(e) => return Err(e),
        };

        op.advance(ScalePhase::Placing)?;
        match op.direction {
            Direction::Up => self.grow(op, &group, provider).await,
            Direction::Down => self.shrink(op, &group, provider).await,
        }
    }

    fn validated(&self, op: &ScaleOperation) -> ScaleResult<(ScalingGroup, Arc<dyn Provider>)> {
        let group = self
            .store
            .scaling_group(&op.group)?
            .ok_or_else(|| ValidationError::UnknownScalingGroup(op.group.clone()))?;

        let provider = self.providers.get(&group.kind()).cloned().ok_or_else(|| {
            ValidationError::ProviderMismatch {
                group: group.name.clone(),
                kind: group.kind(),
                expected: self.registered_kinds(),
            }
        })?;

        let ceiling = self.settings.max_scale_ceiling();
        validate(op.quantity, ceiling, &group, provider.as_ref(), self.store.as_ref())?;
        Ok((group, provider))
    }

    /// The coordinator running lifecycle operations for `provider`'s instances.
    fn coordinator_for(&self, provider: &dyn Provider) -> Coordinator {
        match provider.lifecycle() {
            Some(backend) => Coordinator::new(backend, *self.coordinator.timeouts()),
            None => self.coordinator.clone(),
        }
    }

    fn registered_kinds(&self) -> String {
        let mut kinds: Vec<String> = self.providers.keys().map(ToString::to_string).collect();
        kinds.sort();
        kinds.join(" or ")
    }

    async fn grow(
        &self,
        op: &mut ScaleOperation,
        group: &ScalingGroup,
        provider: Arc<dyn Provider>,
    ) -> ScaleResult<ScaleReport> {
        let instances = self.store.instances_of(&group.deployment_group_ref)?;
        let mut balance = NodeBalance::build(&instances, group.node_refs());
        let spec = OperationSpec::create();

        let mut creation = OperationOutcome {
            operation: spec.kind,
            mode: spec.mode,
            requested: op.quantity as usize,
            results: Vec::new(),
        };
        let mut created = Vec::new();

        for n in 0..op.quantity {
            if n > 0 {
                op.advance(ScalePhase::Placing)?;
            }
            let node = if balance.is_empty() {
                None
            } else {
                let node = pick_growth_target(&balance).ok_or_else(|| {
                    ScaleError::Internal("no growth target in a non-empty balance".to_string())
                })?;
                Some(node)
            };
            debug!(group = %group.name, ?node, placement = n + 1, "placing instance");

            op.advance(ScalePhase::Executing)?;
            let target = CreateTarget { node: node.clone() };
            let outcome = self
                .coordinator
                .run(&spec, vec![target], |target: CreateTarget| {
                    let provider = provider.clone();
                    let group = group.clone();
                    async move { provider.create_one(&group, &target).await.map(Some) }
                })
                .await;

            let name = outcome.details().into_iter().next();
            creation.results.extend(outcome.results);

            let Some(name) = name else {
                error!(
                    group = %group.name,
                    created = created.len(),
                    requested = op.quantity,
                    "instance creation failed, aborting scale up"
                );
                op.advance(ScalePhase::PartialFailure)?;
                let causes = creation.failure_causes();
                return Ok(ScaleReport::partial(
                    op.direction,
                    &group.name,
                    op.quantity,
                    created,
                    vec![creation],
                    causes,
                ));
            };

            if let Some(node) = &node {
                balance.increment(node)?;
            }
            created.push(name);
        }

        let started = self
            .coordinator_for(provider.as_ref())
            .lifecycle(OperationKind::Start, &created)
            .await;
        let causes = started.failure_causes();
        let mut message = completed_message(created.len() as u32, op.quantity);
        if !causes.is_empty() {
            warn!(group = %group.name, failed = causes.len(), "some new instances failed to start");
            message.push_str(&format!("; {} failed to start", causes.len()));
        }

        op.advance(ScalePhase::Completed)?;
        Ok(ScaleReport {
            direction: op.direction,
            group: group.name.clone(),
            phase: op.phase(),
            success: causes.is_empty(),
            message,
            requested: op.quantity,
            completed: created.len() as u32,
            instances: created,
            sub_reports: vec![creation, started],
            failure_causes: causes,
        })
    }

    async fn shrink(
        &self,
        op: &mut ScaleOperation,
        group: &ScalingGroup,
        provider: Arc<dyn Provider>,
    ) -> ScaleResult<ScaleReport> {
        let instances = self.store.instances_of(&group.deployment_group_ref)?;
        let removal = select_for_removal(&instances, group.node_refs(), op.quantity)?;
        info!(
            group = %group.name,
            selected = removal.instances.len(),
            removes_all = removal.removes_all,
            "instances selected for removal"
        );

        op.advance(ScalePhase::Executing)?;
        let coordinator = self.coordinator_for(provider.as_ref());
        let stopped = coordinator
            .lifecycle(OperationKind::Stop, &removal.instances)
            .await;
        // Instances that failed to stop are left registered.
        let deleted = coordinator
            .lifecycle(OperationKind::Delete, &stopped.succeeded_targets())
            .await;

        let mut causes = stopped.failure_causes();
        causes.extend(deleted.failure_causes());

        let completed = deleted.succeeded() as u32;
        let mut message = completed_message(completed, removal.instances.len() as u32);
        if removal.instances.is_empty() {
            let note = format!("Scaling Group {} has no instances to remove", group.name);
            warn!(group = %group.name, requested = op.quantity, "nothing to remove");
            message.push_str(&format!("; {note}"));
            causes.push(note);
        }
        if removal.shortfall > 0 {
            let note = format!(
                "{} instances could not be selected: the remaining instances are not on the scaling group's nodes",
                removal.shortfall
            );
            message.push_str(&format!("; {note}"));
            causes.push(note);
        }

        op.advance(ScalePhase::Completed)?;
        Ok(ScaleReport {
            direction: op.direction,
            group: group.name.clone(),
            phase: op.phase(),
            success: causes.is_empty(),
            message,
            requested: op.quantity,
            completed,
            instances: removal.instances,
            sub_reports: vec![stopped, deleted],
            failure_causes: causes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scalegrid_executor::{ExecResult, LifecycleBackend, Timeouts};
    use scalegrid_state::StateStore;

    struct Idle;

    #[async_trait]
    impl LifecycleBackend for Idle {
        async fn start(&self, _instance: &str) -> ExecResult<()> {
            Ok(())
        }

        async fn stop(&self, _instance: &str) -> ExecResult<()> {
            Ok(())
        }

        async fn delete(&self, _instance: &str) -> ExecResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn group_locks_are_released_after_each_request() {
        let store = StateStore::open_in_memory().unwrap();
        let coordinator = Coordinator::new(Arc::new(Idle), Timeouts::default());
        let scaler = Scaler::new(Arc::new(store), coordinator, ScalerSettings::default());

        for n in 0..50 {
            let report = scaler.scale_up(&format!("missing-{n}"), 1).await;
            assert_eq!(report.phase, ScalePhase::ValidationFailed);
        }

        assert!(scaler.locks.lock().await.is_empty());
    }
}
