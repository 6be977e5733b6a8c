//! Domain records for the scalegrid state store.
//!
//! These are the configuration records the scaling engine reads: scaling
//! group definitions, deployment groups, nodes and instances. All of them
//! serialize to JSON for storage in redb tables and to TOML for inventory
//! files.

use serde::{Deserialize, Serialize};

/// Identifier of a node (physical or virtual host).
pub type NodeId = String;

/// Name of an instance, assigned by the creation backend.
pub type InstanceName = String;

// ── Scaling group ─────────────────────────────────────────────────

/// Definition of one scalable group.
///
/// Created and mutated only through the store; the scaler treats it as
/// read-only for the duration of one operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScalingGroup {
    pub name: String,
    /// Configuration new instances are created against.
    #[serde(default = "default_config_ref")]
    pub config_ref: String,
    /// Deployment group whose membership this group scales.
    pub deployment_group_ref: String,
    #[serde(default)]
    pub min_instances: u32,
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    /// Provider-specific payload.
    #[serde(flatten)]
    pub provider: ProviderConfig,
}

/// Provider payload of a scaling group, tagged by `provider`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Instances are spread across a fixed, ordered set of nodes.
    Nodes { node_refs: Vec<NodeId> },
    /// Instances are backed by freshly provisioned cloud machines.
    Cloud {
        region: String,
        image_id: String,
        instance_type: String,
        install_dir: String,
        password_file_path: String,
    },
}

/// Discriminant of [`ProviderConfig`], used to look up a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Nodes,
    Cloud,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Nodes => write!(f, "Nodes"),
            ProviderKind::Cloud => write!(f, "Cloud"),
        }
    }
}

/// Config used when a scaling group does not name one.
pub const DEFAULT_CONFIG_REF: &str = "default-config";

fn default_config_ref() -> String {
    DEFAULT_CONFIG_REF.to_string()
}

fn default_max_instances() -> u32 {
    u32::MAX
}

impl ScalingGroup {
    /// Which provider implementation handles this group.
    pub fn kind(&self) -> ProviderKind {
        match self.provider {
            ProviderConfig::Nodes { .. } => ProviderKind::Nodes,
            ProviderConfig::Cloud { .. } => ProviderKind::Cloud,
        }
    }

    /// Configured node references, in tie-break order. Empty for cloud groups.
    pub fn node_refs(&self) -> &[NodeId] {
        match &self.provider {
            ProviderConfig::Nodes { node_refs } => node_refs,
            ProviderConfig::Cloud { .. } => &[],
        }
    }

    /// Whether instances should be created against a non-default config.
    pub fn uses_custom_config(&self) -> bool {
        self.config_ref != DEFAULT_CONFIG_REF
    }
}

// ── Deployment group ──────────────────────────────────────────────

/// A deployment group. Its membership is the set of instance records
/// pointing at it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentGroup {
    pub name: String,
    #[serde(default = "default_config_ref")]
    pub config_ref: String,
}

// ── Node ──────────────────────────────────────────────────────────

/// A host instances can be placed on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: NodeId,
    pub host: String,
    /// Node type, e.g. "ssh" or "config".
    #[serde(default = "default_node_kind")]
    pub kind: String,
}

fn default_node_kind() -> String {
    "config".to_string()
}

// ── Instance ──────────────────────────────────────────────────────

/// A running (or stopped) unit of compute in a deployment group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: InstanceName,
    pub deployment_group: String,
    pub node_ref: NodeId,
    #[serde(default)]
    pub status: InstanceStatus,
}

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    #[default]
    Stopped,
    Running,
}

impl InstanceRecord {
    /// Build the composite key for the instances table.
    pub fn table_key(&self) -> String {
        instance_key(&self.deployment_group, &self.name)
    }
}

/// Composite instances-table key for a deployment group member.
pub fn instance_key(deployment_group: &str, name: &str) -> String {
    format!("{deployment_group}:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_payload_is_tagged() {
        let group = ScalingGroup {
            name: "web".to_string(),
            config_ref: DEFAULT_CONFIG_REF.to_string(),
            deployment_group_ref: "dg-web".to_string(),
            min_instances: 0,
            max_instances: 4,
            provider: ProviderConfig::Nodes {
                node_refs: vec!["n1".to_string(), "n2".to_string()],
            },
        };

        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["provider"], "nodes");
        assert_eq!(json["node_refs"][1], "n2");

        let back: ScalingGroup = serde_json::from_value(json).unwrap();
        assert_eq!(back, group);
    }

    #[test]
    fn cloud_group_has_no_node_refs() {
        let group = ScalingGroup {
            name: "burst".to_string(),
            config_ref: "burst-config".to_string(),
            deployment_group_ref: "dg-burst".to_string(),
            min_instances: 0,
            max_instances: 8,
            provider: ProviderConfig::Cloud {
                region: "eu-west-1".to_string(),
                image_id: "ami-0abc".to_string(),
                instance_type: "t3.micro".to_string(),
                install_dir: "/opt/server".to_string(),
                password_file_path: "/opt/server/passwordfile".to_string(),
            },
        };

        assert_eq!(group.kind(), ProviderKind::Cloud);
        assert!(group.node_refs().is_empty());
        assert!(group.uses_custom_config());
    }

    #[test]
    fn instance_status_defaults_to_stopped() {
        let json = r#"{"name":"i1","deployment_group":"dg","node_ref":"n1"}"#;
        let inst: InstanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(inst.status, InstanceStatus::Stopped);
        assert_eq!(inst.table_key(), "dg:i1");
    }
}
