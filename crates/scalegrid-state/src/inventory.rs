//! Inventory file parser.
//!
//! An inventory is a TOML document describing nodes, deployment groups,
//! instances and scaling groups. Importing it seeds a [`StateStore`].
//!
//! ```toml
//! [[node]]
//! name = "n1"
//! host = "10.0.0.11"
//! kind = "ssh"
//!
//! [[deployment_group]]
//! name = "dg-web"
//!
//! [[instance]]
//! name = "web-1"
//! deployment_group = "dg-web"
//! node_ref = "n1"
//! status = "running"
//!
//! [[scaling_group]]
//! name = "web"
//! deployment_group_ref = "dg-web"
//! max_instances = 10
//! provider = "nodes"
//! node_refs = ["n1", "n2"]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::StateStore;
use crate::types::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeRecord>,
    #[serde(default, rename = "deployment_group")]
    pub deployment_groups: Vec<DeploymentGroup>,
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceRecord>,
    #[serde(default, rename = "scaling_group")]
    pub scaling_groups: Vec<ScalingGroup>,
}

impl Inventory {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading inventory {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing inventory {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write every record into the store, replacing records with the same key.
    pub fn apply(&self, store: &StateStore) -> anyhow::Result<()> {
        for node in &self.nodes {
            store.put_node(node)?;
        }
        for dg in &self.deployment_groups {
            store.put_deployment_group(dg)?;
        }
        for instance in &self.instances {
            store.put_instance(instance)?;
        }
        for group in &self.scaling_groups {
            store.put_scaling_group(group)?;
        }
        info!(
            nodes = self.nodes.len(),
            deployment_groups = self.deployment_groups.len(),
            instances = self.instances.len(),
            scaling_groups = self.scaling_groups.len(),
            "inventory imported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConfigStore;

    const SAMPLE: &str = r#"
[[node]]
name = "n1"
host = "10.0.0.11"
kind = "ssh"

[[node]]
name = "n2"
host = "10.0.0.12"

[[deployment_group]]
name = "dg-web"

[[instance]]
name = "web-1"
deployment_group = "dg-web"
node_ref = "n1"
status = "running"

[[scaling_group]]
name = "web"
deployment_group_ref = "dg-web"
max_instances = 10
provider = "nodes"
node_refs = ["n1", "n2"]

[[scaling_group]]
name = "burst"
config_ref = "burst-config"
deployment_group_ref = "dg-web"
provider = "cloud"
region = "eu-west-1"
image_id = "ami-0123456789"
instance_type = "t3.large"
install_dir = "/opt/server"
password_file_path = "/opt/server/passwordfile"
"#;

    #[test]
    fn parse_sample_inventory() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        assert_eq!(inv.nodes.len(), 2);
        assert_eq!(inv.nodes[1].kind, "config");
        assert_eq!(inv.instances[0].status, InstanceStatus::Running);
        assert_eq!(inv.scaling_groups[0].node_refs(), ["n1", "n2"]);
        assert_eq!(inv.scaling_groups[0].config_ref, DEFAULT_CONFIG_REF);
        assert_eq!(inv.scaling_groups[1].kind(), ProviderKind::Cloud);
    }

    #[test]
    fn apply_seeds_store() {
        let store = StateStore::open_in_memory().unwrap();
        Inventory::parse(SAMPLE).unwrap().apply(&store).unwrap();

        assert!(store.node_exists("n2").unwrap());
        assert!(store.deployment_group("dg-web").unwrap().is_some());
        assert_eq!(store.instances_of("dg-web").unwrap().len(), 1);
        assert_eq!(store.scaling_groups().unwrap().len(), 2);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let bad = r#"
[[scaling_group]]
name = "x"
deployment_group_ref = "dg"
provider = "mainframe"
"#;
        assert!(Inventory::parse(bad).is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let err = Inventory::from_file(Path::new("/definitely/missing.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/missing.toml"));
    }
}
