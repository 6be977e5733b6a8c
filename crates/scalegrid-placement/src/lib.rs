//! scalegrid placement: keeps instance counts even across a group's nodes.
//!
//! This crate decides *where*: which node receives the next new instance
//! and which instances are removed on scale-down. It never talks to a
//! backend; the scaler drives it one decision at a time.
//!
//! # Components
//!
//! - **`balance`**: `NodeBalance`, the per-operation node → count tally
//! - **`selector`**: min/max target selection and removal planning
//!
//! # Loop contract
//!
//! ```text
//! balance = NodeBalance::build(instances, node_refs)
//! repeat:
//!     node = pick_growth_target(&balance)    // pure read
//!     act on node (create instance)
//!     balance.increment(node)                // before the next pick
//! ```

pub mod balance;
pub mod selector;

pub use balance::{BalanceError, NodeBalance};
pub use selector::{Removal, pick_growth_target, pick_shrink_target, select_for_removal};
