//! Seam to the remote workflow runner

use async_trait::async_trait;
use serde_json::Value;

use super::types::ExecutionSnapshot;
use crate::error::Result;

/// Remote service that starts and controls workflow instances
///
/// Implementations own transport concerns (HTTP, auth, retries). Every
/// call is awaited by the owner of the [`WorkflowFlow`](crate::WorkflowFlow)
/// and its result applied on the same task.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Start a run of `workflow_id`; returns the new instance id
    async fn start(&self, workflow_id: &str, input: &Value, version: Option<u32>) -> Result<String>;

    async fn fetch(&self, instance_id: &str) -> Result<ExecutionSnapshot>;

    async fn pause(&self, instance_id: &str) -> Result<()>;

    async fn resume(&self, instance_id: &str) -> Result<()>;

    async fn terminate(&self, instance_id: &str) -> Result<()>;

    /// Remove the instance and its history
    async fn delete(&self, instance_id: &str) -> Result<()>;
}
