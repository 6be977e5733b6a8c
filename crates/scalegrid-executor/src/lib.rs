//! scalegrid-executor: runs one remote operation against many targets.
//!
//! Operations that only touch state local to each instance (start, stop)
//! are dispatched concurrently on a `JoinSet`. Operations that mutate
//! shared registration state (create, delete) run strictly one after
//! another. Every target yields exactly one [`TargetResult`]; the
//! aggregate [`OperationOutcome`] carries the verdict.
//!
//! # Architecture
//!
//! ```text
//! Coordinator
//!   ├── Timeouts (per-operation call budget)
//!   ├── LifecycleBackend (start / stop / delete)
//!   └── run(spec, targets, op)
//!       ├── Sequential → in order, optional fail-fast
//!       └── Parallel   → JoinSet, join point waits for all
//! ```

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod outcome;

pub use backend::LifecycleBackend;
pub use coordinator::{Coordinator, Timeouts};
pub use error::{ExecError, ExecResult};
pub use outcome::{
    ExecutionMode, FailurePolicy, OperationKind, OperationOutcome, OperationSpec, TargetResult,
    Verdict,
};
