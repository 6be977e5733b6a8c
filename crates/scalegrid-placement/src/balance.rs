//! Per-node instance tally for one scaling operation.

use serde::Serialize;
use thiserror::Error;

use scalegrid_state::{InstanceRecord, NodeId};

/// Violations of the balance invariants. These indicate a bug in the
/// caller, never bad user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("node {0} is not tracked by this balance")]
    UnknownNode(NodeId),

    #[error("cannot decrement node {0}: count is already zero")]
    Underflow(NodeId),
}

/// Node → instance count, in the group's configured node order.
///
/// Every configured node is present, even with a count of zero. Counts
/// never go negative. The order of entries is the tie-break order used by
/// the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeBalance {
    entries: Vec<(NodeId, u32)>,
}

impl NodeBalance {
    /// Build a balance from a deployment group's instances.
    ///
    /// Instances on nodes outside `node_refs` are ignored. Repeated node
    /// refs collapse to their first occurrence.
    pub fn build(instances: &[InstanceRecord], node_refs: &[NodeId]) -> Self {
        let mut entries: Vec<(NodeId, u32)> = Vec::with_capacity(node_refs.len());
        for node in node_refs {
            if !entries.iter().any(|(n, _)| n == node) {
                entries.push((node.clone(), 0));
            }
        }

        for instance in instances {
            if let Some((_, count)) = entries.iter_mut().find(|(n, _)| *n == instance.node_ref) {
                *count += 1;
            }
        }

        Self { entries }
    }

    /// Record one more instance on `node`.
    pub fn increment(&mut self, node: &str) -> Result<(), BalanceError> {
        let count = self.slot(node)?;
        *count += 1;
        Ok(())
    }

    /// Record one fewer instance on `node`. Fails rather than clamping at zero.
    pub fn decrement(&mut self, node: &str) -> Result<(), BalanceError> {
        let count = self.slot(node)?;
        if *count == 0 {
            return Err(BalanceError::Underflow(node.to_string()));
        }
        *count -= 1;
        Ok(())
    }

    /// Current count for `node`, or `None` if it is not tracked.
    pub fn count(&self, node: &str) -> Option<u32> {
        self.entries.iter().find(|(n, _)| n == node).map(|(_, c)| *c)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Tracked nodes with their counts, in configured order.
    pub fn entries(&self) -> &[(NodeId, u32)] {
        &self.entries
    }

    /// Tracked node ids, in configured order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.iter().map(|(n, _)| n)
    }

    /// True if no nodes are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&mut self, node: &str) -> Result<&mut u32, BalanceError> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == node)
            .map(|(_, c)| c)
            .ok_or_else(|| BalanceError::UnknownNode(node.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalegrid_state::InstanceStatus;

    fn inst(name: &str, node: &str) -> InstanceRecord {
        InstanceRecord {
            name: name.to_string(),
            deployment_group: "dg".to_string(),
            node_ref: node.to_string(),
            status: InstanceStatus::Running,
        }
    }

    fn refs(nodes: &[&str]) -> Vec<NodeId> {
        nodes.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_nodes_start_at_zero() {
        let balance = NodeBalance::build(&[], &refs(&["n1", "n2"]));
        assert_eq!(balance.count("n1"), Some(0));
        assert_eq!(balance.count("n2"), Some(0));
        assert_eq!(balance.total(), 0);
    }

    #[test]
    fn instances_outside_group_are_ignored() {
        let instances = vec![
            inst("a", "n1"),
            inst("b", "n1"),
            inst("c", "n2"),
            inst("d", "elsewhere"),
        ];
        let balance = NodeBalance::build(&instances, &refs(&["n1", "n2"]));

        assert_eq!(balance.count("n1"), Some(2));
        assert_eq!(balance.count("n2"), Some(1));
        assert_eq!(balance.count("elsewhere"), None);
        // Sum matches the instances that live on tracked nodes.
        assert_eq!(balance.total(), 3);
    }

    #[test]
    fn build_is_pure() {
        let instances = vec![inst("a", "n2"), inst("b", "n1"), inst("c", "n2")];
        let nodes = refs(&["n1", "n2", "n3"]);
        assert_eq!(
            NodeBalance::build(&instances, &nodes),
            NodeBalance::build(&instances, &nodes)
        );
    }

    #[test]
    fn keeps_configured_order_and_collapses_duplicates() {
        let balance = NodeBalance::build(&[], &refs(&["n3", "n1", "n3"]));
        let order: Vec<&NodeId> = balance.nodes().collect();
        assert_eq!(order, vec!["n3", "n1"]);
    }

    #[test]
    fn increment_and_decrement() {
        let mut balance = NodeBalance::build(&[inst("a", "n1")], &refs(&["n1"]));
        balance.increment("n1").unwrap();
        assert_eq!(balance.count("n1"), Some(2));
        balance.decrement("n1").unwrap();
        balance.decrement("n1").unwrap();
        assert_eq!(balance.count("n1"), Some(0));
    }

    #[test]
    fn decrement_at_zero_is_an_error() {
        let mut balance = NodeBalance::build(&[], &refs(&["n1"]));
        assert_eq!(
            balance.decrement("n1"),
            Err(BalanceError::Underflow("n1".to_string()))
        );
        assert_eq!(balance.count("n1"), Some(0));
    }

    #[test]
    fn untracked_node_is_an_error() {
        let mut balance = NodeBalance::build(&[], &refs(&["n1"]));
        assert_eq!(
            balance.increment("n9"),
            Err(BalanceError::UnknownNode("n9".to_string()))
        );
    }

    #[test]
    fn serializes_in_configured_order() {
        let balance = NodeBalance::build(&[inst("a", "n2")], &refs(&["n2", "n1"]));
        let json = serde_json::to_string(&balance).unwrap();
        assert_eq!(json, r#"{"entries":[["n2",1],["n1",0]]}"#);
    }
}
