//! redb table definitions for the scalegrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Scaling group definitions keyed by `{name}`.
pub const SCALING_GROUPS: TableDefinition<&str, &[u8]> = TableDefinition::new("scaling_groups");

/// Deployment groups keyed by `{name}`.
pub const DEPLOYMENT_GROUPS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("deployment_groups");

/// Nodes keyed by `{name}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Instances keyed by `{deployment_group}:{instance}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");
