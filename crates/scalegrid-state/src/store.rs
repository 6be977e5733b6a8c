//! StateStore: redb-backed configuration store for scalegrid.
//!
//! The scaling engine reads through [`ConfigStore`]; adapters and the
//! inventory import write through the inherent `put_*`/`delete_*` methods.
//! Values are JSON-serialized into redb's `&[u8]` value columns. Both
//! on-disk and in-memory backends are supported (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Read-only view of the configuration the scaling engine depends on.
///
/// Implementations must return fresh data on every call; the engine never
/// caches results across operations.
pub trait ConfigStore: Send + Sync {
    /// Look up a scaling group by name.
    fn scaling_group(&self, name: &str) -> StateResult<Option<ScalingGroup>>;

    /// All configured scaling groups.
    fn scaling_groups(&self) -> StateResult<Vec<ScalingGroup>>;

    /// Look up a deployment group by name.
    fn deployment_group(&self, name: &str) -> StateResult<Option<DeploymentGroup>>;

    /// Current members of a deployment group, in stable key order.
    fn instances_of(&self, deployment_group: &str) -> StateResult<Vec<InstanceRecord>>;

    /// Whether a node with this name exists.
    fn node_exists(&self, name: &str) -> StateResult<bool>;
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SCALING_GROUPS).map_err(map_err!(Table))?;
        txn.open_table(DEPLOYMENT_GROUPS).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Scaling groups ─────────────────────────────────────────────

    /// Insert or update a scaling group.
    pub fn put_scaling_group(&self, group: &ScalingGroup) -> StateResult<()> {
        self.put(SCALING_GROUPS, &group.name, group)?;
        debug!(group = %group.name, kind = %group.kind(), "scaling group stored");
        Ok(())
    }

    // ── Deployment groups ──────────────────────────────────────────

    /// Insert or update a deployment group.
    pub fn put_deployment_group(&self, group: &DeploymentGroup) -> StateResult<()> {
        self.put(DEPLOYMENT_GROUPS, &group.name, group)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node.
    pub fn put_node(&self, node: &NodeRecord) -> StateResult<()> {
        self.put(NODES, &node.name, node)
    }

    /// Get a node by name.
    pub fn get_node(&self, name: &str) -> StateResult<Option<NodeRecord>> {
        self.get(NODES, name)
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Insert or update an instance.
    pub fn put_instance(&self, instance: &InstanceRecord) -> StateResult<()> {
        self.put(INSTANCES, &instance.table_key(), instance)
    }

    /// Find an instance by name in any deployment group.
    pub fn find_instance(&self, name: &str) -> StateResult<Option<InstanceRecord>> {
        let all: Vec<InstanceRecord> = self.scan(INSTANCES, "")?;
        Ok(all.into_iter().find(|i| i.name == name))
    }

    /// Update the status of an instance identified by name.
    pub fn set_instance_status(&self, name: &str, status: InstanceStatus) -> StateResult<()> {
        let mut instance = self.find_instance(name)?.ok_or_else(|| StateError::Missing {
            kind: "instance",
            name: name.to_string(),
        })?;
        instance.status = status;
        self.put_instance(&instance)?;
        debug!(instance = %name, ?status, "instance status updated");
        Ok(())
    }

    /// Delete an instance identified by name. Returns true if it existed.
    pub fn delete_instance(&self, name: &str) -> StateResult<bool> {
        match self.find_instance(name)? {
            Some(instance) => self.remove(INSTANCES, &instance.table_key()),
            None => Ok(false),
        }
    }

    // ── Generic table access ───────────────────────────────────────

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            t.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Decode every value whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                results.push(serde_json::from_slice(value.value()).map_err(map_err!(Decode))?);
            }
        }
        Ok(results)
    }

    fn remove(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "record deleted");
        Ok(existed)
    }
}

impl ConfigStore for StateStore {
    fn scaling_group(&self, name: &str) -> StateResult<Option<ScalingGroup>> {
        self.get(SCALING_GROUPS, name)
    }

    fn scaling_groups(&self) -> StateResult<Vec<ScalingGroup>> {
        self.scan(SCALING_GROUPS, "")
    }

    fn deployment_group(&self, name: &str) -> StateResult<Option<DeploymentGroup>> {
        self.get(DEPLOYMENT_GROUPS, name)
    }

    fn instances_of(&self, deployment_group: &str) -> StateResult<Vec<InstanceRecord>> {
        self.scan(INSTANCES, &format!("{deployment_group}:"))
    }

    fn node_exists(&self, name: &str) -> StateResult<bool> {
        Ok(self.get_node(name)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes_group(name: &str, dg: &str, nodes: &[&str]) -> ScalingGroup {
        ScalingGroup {
            name: name.to_string(),
            config_ref: DEFAULT_CONFIG_REF.to_string(),
            deployment_group_ref: dg.to_string(),
            min_instances: 0,
            max_instances: 10,
            provider: ProviderConfig::Nodes {
                node_refs: nodes.iter().map(|n| n.to_string()).collect(),
            },
        }
    }

    fn instance(dg: &str, name: &str, node: &str) -> InstanceRecord {
        InstanceRecord {
            name: name.to_string(),
            deployment_group: dg.to_string(),
            node_ref: node.to_string(),
            status: InstanceStatus::Running,
        }
    }

    fn node(name: &str) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            host: format!("{name}.internal"),
            kind: "ssh".to_string(),
        }
    }

    // ── Scaling groups ─────────────────────────────────────────────

    #[test]
    fn scaling_group_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let group = nodes_group("web", "dg-web", &["n1", "n2"]);

        store.put_scaling_group(&group).unwrap();

        assert_eq!(store.scaling_group("web").unwrap(), Some(group));
        assert!(store.scaling_group("nope").unwrap().is_none());
    }

    #[test]
    fn scaling_groups_list_all() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_scaling_group(&nodes_group("a", "dg", &["n1"])).unwrap();
        store.put_scaling_group(&nodes_group("b", "dg", &["n1"])).unwrap();

        let names: Vec<String> = store
            .scaling_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    // ── Instances ──────────────────────────────────────────────────

    #[test]
    fn instances_are_scoped_to_deployment_group() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_instance(&instance("dg-a", "i1", "n1")).unwrap();
        store.put_instance(&instance("dg-a", "i2", "n2")).unwrap();
        store.put_instance(&instance("dg-b", "i3", "n1")).unwrap();

        assert_eq!(store.instances_of("dg-a").unwrap().len(), 2);
        assert_eq!(store.instances_of("dg-b").unwrap().len(), 1);
        assert!(store.instances_of("dg-c").unwrap().is_empty());
    }

    #[test]
    fn instance_status_update_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let mut inst = instance("dg", "i1", "n1");
        inst.status = InstanceStatus::Stopped;
        store.put_instance(&inst).unwrap();

        store.set_instance_status("i1", InstanceStatus::Running).unwrap();
        assert_eq!(
            store.find_instance("i1").unwrap().unwrap().status,
            InstanceStatus::Running
        );

        assert!(store.delete_instance("i1").unwrap());
        assert!(!store.delete_instance("i1").unwrap());
        assert!(store.instances_of("dg").unwrap().is_empty());
    }

    #[test]
    fn status_update_of_missing_instance_fails() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store
            .set_instance_status("ghost", InstanceStatus::Running)
            .unwrap_err();
        assert!(matches!(err, StateError::Missing { kind: "instance", .. }));
    }

    // ── Nodes and deployment groups ────────────────────────────────

    #[test]
    fn node_existence() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_node(&node("n1")).unwrap();

        assert!(store.node_exists("n1").unwrap());
        assert!(!store.node_exists("n2").unwrap());
    }

    #[test]
    fn deployment_group_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let dg = DeploymentGroup {
            name: "dg-web".to_string(),
            config_ref: DEFAULT_CONFIG_REF.to_string(),
        };
        store.put_deployment_group(&dg).unwrap();

        assert_eq!(store.deployment_group("dg-web").unwrap(), Some(dg));
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_scaling_group(&nodes_group("web", "dg", &["n1"])).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        let group = store.scaling_group("web").unwrap();
        assert_eq!(group.map(|g| g.deployment_group_ref), Some("dg".to_string()));
    }
}
