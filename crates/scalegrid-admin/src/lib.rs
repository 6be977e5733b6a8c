//! scalegrid-admin: backends the scaler talks to.
//!
//! - [`AdminCli`] shells out to an administration tool for instance
//!   registration and lifecycle.
//! - [`StoreBackend`] performs the same operations directly against a
//!   [`StateStore`](scalegrid_state::StateStore), for local use.
//! - [`AwsCliProvisioner`] provisions and manages cloud machines through
//!   the `aws` CLI.

pub mod aws;
pub mod command;
pub mod local;
mod process;

pub use aws::{AwsCliConfig, AwsCliProvisioner, parse_instance_id};
pub use command::{AdminCli, AdminCliConfig, create_instance_args, parse_created_instance};
pub use local::StoreBackend;
