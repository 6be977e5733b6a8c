//! Request validation. Runs before any side effect.

use tracing::debug;

use scalegrid_state::{ConfigStore, ScalingGroup};

use crate::error::{ScaleResult, ValidationError};
use crate::provider::Provider;

/// Check a scale request against the group definition and its provider.
///
/// `ceiling` is the effective maximum scale, already corrected for
/// misconfiguration.
pub fn validate(
    quantity: u32,
    ceiling: u32,
    group: &ScalingGroup,
    provider: &dyn Provider,
    store: &dyn ConfigStore,
) -> ScaleResult<()> {
    if quantity < 1 {
        return Err(ValidationError::QuantityTooSmall(quantity).into());
    }
    if quantity > ceiling {
        return Err(ValidationError::QuantityAboveCeiling { quantity, ceiling }.into());
    }
    if group.min_instances > group.max_instances {
        return Err(ValidationError::InconsistentBounds {
            min: group.min_instances,
            max: group.max_instances,
        }
        .into());
    }
    if store.deployment_group(&group.deployment_group_ref)?.is_none() {
        return Err(ValidationError::UnknownDeploymentGroup(group.deployment_group_ref.clone()).into());
    }

    provider.validate_extra(group, store)?;

    debug!(group = %group.name, quantity, ceiling, "scale request valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use scalegrid_executor::ExecResult;
    use scalegrid_state::{DeploymentGroup, InstanceName, NodeRecord, ProviderConfig, StateStore};

    use crate::error::ScaleError;
    use crate::provider::{InstanceRegistry, NodesProvider};

    struct NoRegistry;

    #[async_trait]
    impl InstanceRegistry for NoRegistry {
        async fn create_instance_on(&self, _: &str, _: &ScalingGroup) -> ExecResult<InstanceName> {
            unreachable!("validation never creates")
        }
    }

    fn setup() -> (StateStore, ScalingGroup, NodesProvider) {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_deployment_group(&DeploymentGroup {
                name: "dg-web".to_string(),
                config_ref: "default-config".to_string(),
            })
            .unwrap();
        store
            .put_node(&NodeRecord {
                name: "n1".to_string(),
                host: "localhost".to_string(),
                kind: "config".to_string(),
            })
            .unwrap();
        let group = ScalingGroup {
            name: "web".to_string(),
            config_ref: "default-config".to_string(),
            deployment_group_ref: "dg-web".to_string(),
            min_instances: 1,
            max_instances: 5,
            provider: ProviderConfig::Nodes {
                node_refs: vec!["n1".to_string()],
            },
        };
        (store, group, NodesProvider::new(Arc::new(NoRegistry)))
    }

    fn validation_of(result: ScaleResult<()>) -> ValidationError {
        match result {
            Err(ScaleError::Validation(v)) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_request() {
        let (store, group, provider) = setup();
        validate(3, 10, &group, &provider, &store).unwrap();
        validate(10, 10, &group, &provider, &store).unwrap();
    }

    #[test]
    fn quantity_bounds() {
        let (store, group, provider) = setup();
        assert_eq!(
            validation_of(validate(0, 10, &group, &provider, &store)),
            ValidationError::QuantityTooSmall(0)
        );
        assert_eq!(
            validation_of(validate(11, 10, &group, &provider, &store)),
            ValidationError::QuantityAboveCeiling {
                quantity: 11,
                ceiling: 10
            }
        );
    }

    #[test]
    fn inconsistent_bounds() {
        let (store, mut group, provider) = setup();
        group.min_instances = 6;
        assert_eq!(
            validation_of(validate(1, 10, &group, &provider, &store)),
            ValidationError::InconsistentBounds { min: 6, max: 5 }
        );
    }

    #[test]
    fn missing_deployment_group() {
        let (store, mut group, provider) = setup();
        group.deployment_group_ref = "dg-gone".to_string();
        assert_eq!(
            validation_of(validate(1, 10, &group, &provider, &store)),
            ValidationError::UnknownDeploymentGroup("dg-gone".to_string())
        );
    }

    #[test]
    fn provider_checks_run_last() {
        let (store, mut group, provider) = setup();
        group.provider = ProviderConfig::Nodes {
            node_refs: vec!["n1".to_string(), "n7".to_string()],
        };
        assert_eq!(
            validation_of(validate(1, 10, &group, &provider, &store)),
            ValidationError::UnknownNode("n7".to_string())
        );
    }
}
