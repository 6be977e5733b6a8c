//! Store-backed backend for local and offline use.
//!
//! Instances are registered by writing records straight into the
//! [`StateStore`]; starting and stopping flips their status. Machines
//! "provisioned" here only live for the lifetime of the backend, while their
//! deployment group membership is stored like any other instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use scalegrid_executor::{ExecError, ExecResult, LifecycleBackend};
use scalegrid_scaler::{InstanceRegistry, MachineRegistry, Provisioner};
use scalegrid_state::{
    ConfigStore, InstanceName, InstanceRecord, InstanceStatus, ScalingGroup, StateError,
    StateStore,
};

pub struct StoreBackend {
    store: StateStore,
    machines: Mutex<HashMap<String, InstanceStatus>>,
    provisioned: AtomicU32,
}

fn backend_err(e: StateError) -> ExecError {
    ExecError::Backend(e.to_string())
}

impl StoreBackend {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            machines: Mutex::new(HashMap::new()),
            provisioned: AtomicU32::new(0),
        }
    }

    /// First free `{deployment_group}-{node}-{n}` name.
    fn next_name(&self, deployment_group: &str, node: &str) -> ExecResult<InstanceName> {
        let mut n = 1u32;
        loop {
            let candidate = format!("{deployment_group}-{node}-{n}");
            if self.store.find_instance(&candidate).map_err(backend_err)?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn set_status(&self, instance: &str, status: InstanceStatus) -> ExecResult<()> {
        let recorded = self.store.find_instance(instance).map_err(backend_err)?.is_some();
        if recorded {
            self.store
                .set_instance_status(instance, status)
                .map_err(backend_err)?;
        }
        let machine = match self.machines.lock().await.get_mut(instance) {
            Some(current) => {
                *current = status;
                debug!(%instance, ?status, "machine status updated");
                true
            }
            None => false,
        };
        if recorded || machine {
            Ok(())
        } else {
            Err(ExecError::Backend(format!("instance {instance} does not exist")))
        }
    }
}

#[async_trait]
impl InstanceRegistry for StoreBackend {
    async fn create_instance_on(
        &self,
        node: &str,
        group: &ScalingGroup,
    ) -> ExecResult<InstanceName> {
        if !self.store.node_exists(node).map_err(backend_err)? {
            return Err(ExecError::Backend(format!("node {node} does not exist")));
        }
        let deployment_group = &group.deployment_group_ref;
        if self
            .store
            .deployment_group(deployment_group)
            .map_err(backend_err)?
            .is_none()
        {
            return Err(ExecError::Backend(format!(
                "deployment group {deployment_group} does not exist"
            )));
        }

        let name = self.next_name(deployment_group, node)?;
        self.store
            .put_instance(&InstanceRecord {
                name: name.clone(),
                deployment_group: deployment_group.clone(),
                node_ref: node.to_string(),
                status: InstanceStatus::Stopped,
            })
            .map_err(backend_err)?;
        info!(instance = %name, %node, %deployment_group, "instance registered");
        Ok(name)
    }
}

#[async_trait]
impl Provisioner for StoreBackend {
    async fn provision(
        &self,
        image_id: &str,
        instance_type: &str,
        region: &str,
    ) -> ExecResult<String> {
        let seq = self.provisioned.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("i-{seq:08x}");
        self.machines
            .lock()
            .await
            .insert(id.clone(), InstanceStatus::Running);
        info!(instance = %id, %image_id, %instance_type, %region, "machine provisioned locally");
        Ok(id)
    }
}

#[async_trait]
impl MachineRegistry for StoreBackend {
    async fn register_machine(
        &self,
        group: &ScalingGroup,
        machine: &str,
        region: &str,
    ) -> ExecResult<()> {
        let deployment_group = &group.deployment_group_ref;
        if self
            .store
            .deployment_group(deployment_group)
            .map_err(backend_err)?
            .is_none()
        {
            return Err(ExecError::Backend(format!(
                "deployment group {deployment_group} does not exist"
            )));
        }
        self.store
            .put_instance(&InstanceRecord {
                name: machine.to_string(),
                deployment_group: deployment_group.clone(),
                node_ref: region.to_string(),
                status: InstanceStatus::Running,
            })
            .map_err(backend_err)?;
        info!(%machine, %deployment_group, %region, "machine registered");
        Ok(())
    }

    async fn deregister_machine(&self, machine: &str) -> ExecResult<()> {
        if self.store.delete_instance(machine).map_err(backend_err)? {
            info!(%machine, "machine deregistered");
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleBackend for StoreBackend {
    async fn start(&self, instance: &str) -> ExecResult<()> {
        self.set_status(instance, InstanceStatus::Running).await
    }

    async fn stop(&self, instance: &str) -> ExecResult<()> {
        self.set_status(instance, InstanceStatus::Stopped).await
    }

    async fn delete(&self, instance: &str) -> ExecResult<()> {
        let recorded = self.store.delete_instance(instance).map_err(backend_err)?;
        let machine = self.machines.lock().await.remove(instance).is_some();
        if !recorded && !machine {
            return Err(ExecError::Backend(format!("instance {instance} does not exist")));
        }
        info!(%instance, recorded, machine, "instance deleted");
        Ok(())
    }
}
