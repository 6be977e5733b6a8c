//! Node-backed provider.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use scalegrid_executor::{ExecError, ExecResult};
use scalegrid_state::{ConfigStore, InstanceName, ProviderKind, ScalingGroup};

use super::{CreateTarget, InstanceRegistry, Provider};
use crate::error::{ScaleResult, ValidationError};

/// Creates instances on the group's configured nodes.
pub struct NodesProvider {
    registry: Arc<dyn InstanceRegistry>,
}

impl NodesProvider {
    pub fn new(registry: Arc<dyn InstanceRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Provider for NodesProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Nodes
    }

    fn validate_extra(&self, group: &ScalingGroup, store: &dyn ConfigStore) -> ScaleResult<()> {
        let node_refs = group.node_refs();
        if node_refs.is_empty() {
            return Err(ValidationError::NoNodes(group.name.clone()).into());
        }
        for node in node_refs {
            if node.trim().is_empty() {
                return Err(ValidationError::BlankNodeRef(group.name.clone()).into());
            }
            if !store.node_exists(node)? {
                return Err(ValidationError::UnknownNode(node.clone()).into());
            }
        }
        debug!(group = %group.name, nodes = node_refs.len(), "node references valid");
        Ok(())
    }

    async fn create_one(
        &self,
        group: &ScalingGroup,
        target: &CreateTarget,
    ) -> ExecResult<InstanceName> {
        let Some(node) = &target.node else {
            return Err(ExecError::Backend(format!(
                "no node chosen for new instance in scaling group {}",
                group.name
            )));
        };
        self.registry.create_instance_on(node, group).await
    }
}
