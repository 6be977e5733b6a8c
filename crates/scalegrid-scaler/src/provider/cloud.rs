//! Cloud-backed provider.
//!
//! Each new instance is a freshly provisioned machine, recorded in the
//! group's deployment group right after it is running. The provisioner is
//! constructed by the caller and handed in; nothing here creates clients
//! lazily.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, error, info};

use scalegrid_executor::{ExecError, ExecResult, LifecycleBackend};
use scalegrid_state::{ConfigStore, InstanceName, ProviderConfig, ProviderKind, ScalingGroup};

use super::{CreateTarget, MachineRegistry, Provider, Provisioner};
use crate::error::{ScaleError, ScaleResult, ValidationError};

/// Regions a cloud scaling group may name.
pub const KNOWN_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ca-central-1",
    "ca-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// `family.size`, e.g. `t3.large`, `m6gd.16xlarge`, `u-6tb1.metal`.
const INSTANCE_TYPE_PATTERN: &str =
    r"^[a-z][a-z0-9-]*[0-9][a-z0-9-]*\.(nano|micro|small|medium|large|[0-9]*xlarge|metal(-[0-9]+xl)?)$";

/// Whether `instance_type` has the shape of a known machine type.
pub fn instance_type_recognized(instance_type: &str) -> bool {
    Regex::new(INSTANCE_TYPE_PATTERN)
        .map(|re| re.is_match(instance_type))
        .unwrap_or(false)
}

pub struct CloudProvider {
    provisioner: Arc<dyn Provisioner>,
    registry: Arc<dyn MachineRegistry>,
    lifecycle: Option<Arc<dyn LifecycleBackend>>,
}

impl CloudProvider {
    pub fn new(provisioner: Arc<dyn Provisioner>, registry: Arc<dyn MachineRegistry>) -> Self {
        Self {
            provisioner,
            registry,
            lifecycle: None,
        }
    }

    /// Start, stop and delete provisioned machines through `backend`
    /// instead of the scaler's default backend. Deleted machines are also
    /// dropped from the registry.
    pub fn with_lifecycle(mut self, backend: Arc<dyn LifecycleBackend>) -> Self {
        self.lifecycle = Some(Arc::new(TrackedMachines {
            machines: backend,
            registry: self.registry.clone(),
        }));
        self
    }
}

/// Machine lifecycle that keeps the registry in step with deletions.
struct TrackedMachines {
    machines: Arc<dyn LifecycleBackend>,
    registry: Arc<dyn MachineRegistry>,
}

#[async_trait]
impl LifecycleBackend for TrackedMachines {
    async fn start(&self, instance: &str) -> ExecResult<()> {
        self.machines.start(instance).await
    }

    async fn stop(&self, instance: &str) -> ExecResult<()> {
        self.machines.stop(instance).await
    }

    async fn delete(&self, instance: &str) -> ExecResult<()> {
        self.machines.delete(instance).await?;
        self.registry.deregister_machine(instance).await
    }
}

fn not_blank(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Blank(field))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Provider for CloudProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn validate_extra(&self, group: &ScalingGroup, _store: &dyn ConfigStore) -> ScaleResult<()> {
        let ProviderConfig::Cloud {
            region,
            image_id,
            instance_type,
            install_dir,
            password_file_path,
        } = &group.provider
        else {
            return Err(ScaleError::Internal(format!(
                "scaling group {} has no cloud payload",
                group.name
            )));
        };

        not_blank(region, "region")?;
        if !KNOWN_REGIONS.contains(&region.as_str()) {
            return Err(ValidationError::UnknownRegion(region.clone()).into());
        }
        not_blank(instance_type, "instance type")?;
        if !instance_type_recognized(instance_type) {
            return Err(ValidationError::UnknownInstanceType(instance_type.clone()).into());
        }
        not_blank(image_id, "image id")?;
        // Paths refer to the provisioned machine; they are not checked here.
        not_blank(install_dir, "install directory")?;
        not_blank(password_file_path, "password file path")?;

        debug!(group = %group.name, %region, %instance_type, "cloud payload valid");
        Ok(())
    }

    async fn create_one(
        &self,
        group: &ScalingGroup,
        _target: &CreateTarget,
    ) -> ExecResult<InstanceName> {
        let ProviderConfig::Cloud {
            region,
            image_id,
            instance_type,
            ..
        } = &group.provider
        else {
            return Err(ExecError::Backend(format!(
                "scaling group {} is not cloud-backed",
                group.name
            )));
        };

        let id = self
            .provisioner
            .provision(image_id, instance_type, region)
            .await?;
        if let Err(e) = self.registry.register_machine(group, &id, region).await {
            error!(group = %group.name, instance = %id, error = %e, "provisioned machine not registered");
            return Err(ExecError::Backend(format!(
                "machine {id} is running but was not registered: {e}"
            )));
        }
        info!(group = %group.name, instance = %id, %region, "cloud instance provisioned");
        Ok(id)
    }

    fn lifecycle(&self) -> Option<Arc<dyn LifecycleBackend>> {
        self.lifecycle.clone()
    }
}
