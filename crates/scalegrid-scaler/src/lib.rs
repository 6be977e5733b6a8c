//! scalegrid-scaler: executes scale-up and scale-down requests.
//!
//! A request names a scaling group, a direction and a quantity. The
//! [`Scaler`] validates it, decides placements through
//! `scalegrid-placement`, runs the remote operations through
//! `scalegrid-executor` and returns one [`ScaleReport`].
//!
//! # Architecture
//!
//! ```text
//! Scaler::scale(group, direction, quantity)
//!   ├── Validating   → ValidationFailed (report, no side effects)
//!   ├── Placing      → growth target / removal selection
//!   ├── Executing    → create (sequential, fail-fast) + start (parallel)
//!   │                  stop (parallel) + delete (sequential)
//!   └── PartialFailure | Completed
//! ```
//!
//! What "create one instance" means is supplied by a [`Provider`]:
//! [`NodesProvider`] registers instances on configured nodes,
//! [`CloudProvider`] provisions a machine per instance.

pub mod error;
pub mod operation;
pub mod provider;
pub mod report;
pub mod scaler;
pub mod settings;
pub mod validate;

pub use error::{ScaleError, ScaleResult, ValidationError};
pub use operation::{Direction, ScaleOperation, ScalePhase};
pub use provider::{
    CloudProvider, CreateTarget, InstanceRegistry, MachineRegistry, NodesProvider, Provider,
    Provisioner,
};
pub use report::ScaleReport;
pub use scaler::Scaler;
pub use settings::{DEFAULT_MAX_SCALE, ScalerSettings};
