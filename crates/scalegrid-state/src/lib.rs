//! scalegrid-state: configuration store for scalegrid.
//!
//! Holds the records the scaling engine reads at the start of every
//! operation: scaling group definitions, deployment groups, nodes and the
//! live instance list.
//!
//! # Architecture
//!
//! The engine only ever sees the read-only [`ConfigStore`] trait. The
//! concrete [`StateStore`] is backed by [redb](https://docs.rs/redb) and
//! JSON-serializes every record into `&[u8]` value columns. Instance keys
//! are `{deployment_group}:{instance}` so a prefix scan yields a deployment
//! group's membership in a stable order.
//!
//! An [`Inventory`] TOML document can be imported into a store to seed it.

pub mod error;
pub mod inventory;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use inventory::Inventory;
pub use store::{ConfigStore, StateStore};
pub use types::*;
