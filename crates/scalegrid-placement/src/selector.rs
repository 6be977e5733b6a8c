//! Growth and shrink target selection.
//!
//! Selection is greedy and one decision at a time: every pick reads the
//! current balance, and the caller updates the balance before the next
//! pick. The result is locally balanced at each step, not globally optimal
//! for unusual group shapes.

use tracing::{debug, warn};

use scalegrid_state::{InstanceName, InstanceRecord, NodeId};

use crate::balance::{BalanceError, NodeBalance};

/// The node with the fewest instances. Ties go to the earliest node in
/// configured order. `None` only if the balance tracks no nodes.
pub fn pick_growth_target(balance: &NodeBalance) -> Option<NodeId> {
    let mut best: Option<&(NodeId, u32)> = None;
    for entry in balance.entries() {
        // Strict comparison keeps the earliest node on ties.
        if best.is_none_or(|b| entry.1 < b.1) {
            best = Some(entry);
        }
    }
    best.map(|(node, _)| node.clone())
}

/// The node with the most instances. Ties go to the earliest node in
/// configured order. `None` if every tracked node is empty.
pub fn pick_shrink_target(balance: &NodeBalance) -> Option<NodeId> {
    let mut best: Option<&(NodeId, u32)> = None;
    for entry in balance.entries() {
        if entry.1 > 0 && best.is_none_or(|b| entry.1 > b.1) {
            best = Some(entry);
        }
    }
    best.map(|(node, _)| node.clone())
}

/// Instances chosen for removal during a scale-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// Instance names in selection order.
    pub instances: Vec<InstanceName>,
    /// How many requested removals could not be matched to an instance on
    /// one of the group's nodes.
    pub shortfall: u32,
    /// True when every instance was selected without consulting a balance.
    pub removes_all: bool,
}

/// Choose `quantity` instances to remove, keeping the nodes balanced.
///
/// If `quantity` covers the whole deployment group every instance is
/// selected and no balance is built. Otherwise each step removes one
/// not-yet-selected instance from the currently most loaded node.
/// Without any `node_refs` the last `quantity` instances are taken,
/// latest first. Instances on nodes outside `node_refs` are never chosen
/// by the balanced path; if only such instances remain, selection stops
/// and the missing count is reported in [`Removal::shortfall`].
pub fn select_for_removal(
    instances: &[InstanceRecord],
    node_refs: &[NodeId],
    quantity: u32,
) -> Result<Removal, BalanceError> {
    if quantity as usize >= instances.len() {
        debug!(
            quantity,
            total = instances.len(),
            "removing every instance in the deployment group"
        );
        return Ok(Removal {
            instances: instances.iter().map(|i| i.name.clone()).collect(),
            shortfall: 0,
            removes_all: true,
        });
    }

    // Groups without nodes (cloud-backed) have nothing to balance: the
    // newest entries in deployment-group order go first.
    if node_refs.is_empty() {
        let keep = instances.len() - quantity as usize;
        let instances: Vec<InstanceName> = instances[keep..]
            .iter()
            .rev()
            .map(|i| i.name.clone())
            .collect();
        debug!(quantity, "no nodes to balance, removing from the end");
        return Ok(Removal {
            instances,
            shortfall: 0,
            removes_all: false,
        });
    }

    let mut balance = NodeBalance::build(instances, node_refs);
    let mut selected: Vec<InstanceName> = Vec::with_capacity(quantity as usize);

    for _ in 0..quantity {
        let Some(node) = pick_shrink_target(&balance) else {
            break;
        };

        let candidate = instances
            .iter()
            .find(|i| i.node_ref == node && !selected.contains(&i.name));

        // A positive count always has a matching unselected instance.
        let Some(candidate) = candidate else {
            return Err(BalanceError::Underflow(node));
        };

        debug!(instance = %candidate.name, %node, "selected for removal");
        selected.push(candidate.name.clone());
        balance.decrement(&node)?;
    }

    let shortfall = quantity - selected.len() as u32;
    if shortfall > 0 {
        warn!(
            requested = quantity,
            selected = selected.len(),
            "remaining instances are on nodes outside the scaling group"
        );
    }

    Ok(Removal {
        instances: selected,
        shortfall,
        removes_all: false,
    })
}
