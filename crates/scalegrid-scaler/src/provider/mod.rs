//! Provider capability: what "create one instance" means for a group.
//!
//! The scaler's balancing, sequencing and reporting are shared; providers
//! only contribute their extra validation and instance creation.

mod cloud;
mod nodes;

pub use cloud::{CloudProvider, KNOWN_REGIONS, instance_type_recognized};
pub use nodes::NodesProvider;

use std::sync::Arc;

use async_trait::async_trait;

use scalegrid_executor::{ExecResult, LifecycleBackend};
use scalegrid_state::{ConfigStore, InstanceName, NodeId, ScalingGroup};

use crate::error::ScaleResult;

/// Where the next instance goes. Cloud groups have no node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTarget {
    pub node: Option<NodeId>,
}

impl std::fmt::Display for CreateTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{node}"),
            None => write!(f, "provisioned"),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> scalegrid_state::ProviderKind;

    /// Provider-specific checks on the group's payload. Must not have side
    /// effects.
    fn validate_extra(&self, group: &ScalingGroup, store: &dyn ConfigStore) -> ScaleResult<()>;

    /// Create a single instance and return its name.
    async fn create_one(&self, group: &ScalingGroup, target: &CreateTarget)
    -> ExecResult<InstanceName>;

    /// Backend that starts, stops and deletes this provider's instances,
    /// when it differs from the scaler's default one.
    fn lifecycle(&self) -> Option<Arc<dyn LifecycleBackend>> {
        None
    }
}

/// Registers a new instance on a node.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    async fn create_instance_on(&self, node: &str, group: &ScalingGroup)
    -> ExecResult<InstanceName>;
}

/// Records provisioned machines as members of a deployment group.
#[async_trait]
pub trait MachineRegistry: Send + Sync {
    async fn register_machine(
        &self,
        group: &ScalingGroup,
        machine: &str,
        region: &str,
    ) -> ExecResult<()>;

    /// Drop a machine's membership. Unknown machines are not an error.
    async fn deregister_machine(&self, machine: &str) -> ExecResult<()>;
}

/// Provisions a cloud machine and waits until it is running.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(
        &self,
        image_id: &str,
        instance_type: &str,
        region: &str,
    ) -> ExecResult<String>;
}
