//! Lifecycle backend seam.

use async_trait::async_trait;

use crate::error::ExecResult;

/// Starts, stops and deletes registered instances.
///
/// Each call is a single attempt; implementations must not retry. The
/// coordinator bounds every call with its own timeout.
#[async_trait]
pub trait LifecycleBackend: Send + Sync {
    async fn start(&self, instance: &str) -> ExecResult<()>;

    async fn stop(&self, instance: &str) -> ExecResult<()>;

    /// Remove the instance registration. Mutates shared state.
    async fn delete(&self, instance: &str) -> ExecResult<()>;
}
