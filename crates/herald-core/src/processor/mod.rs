//! Processor contract: the strategy that pushes a plan's entities to an
//! endpoint and then makes them live there.

pub mod dry_run;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::endpoint::Endpoint;
use crate::operations::Operation;

pub use dry_run::DryRunProcessor;

/// Strategy for deploying a plan's entities.
///
/// A run calls `pre_process` once, `deploy` for every endpoint, `publish`
/// for every endpoint (only after all deploys succeeded), and finally
/// `post_process` once. Errors abort the run.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Run the pre-process operations before anything is pushed.
    async fn pre_process(&self, operations: &[Arc<dyn Operation>]) -> Result<()>;

    /// Push the entity set to `endpoint`. `lock_name` names the lock held
    /// for this run.
    async fn deploy(&self, deployment_id: Uuid, endpoint: &Endpoint, lock_name: &str)
    -> Result<()>;

    /// Make previously deployed content live on `endpoint`.
    async fn publish(
        &self,
        deployment_id: Uuid,
        endpoint: &Endpoint,
        lock_name: &str,
    ) -> Result<()>;

    /// Run the post-process operations after every endpoint is published.
    async fn post_process(&self, operations: &[Arc<dyn Operation>]) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Processor) {}
};

/// Run every operation on every entity the aggregator yields.
///
/// Entities are visited in stream order; for each entity the operations run
/// in the order given. Returns the number of entities visited.
pub async fn run_operations(
    aggregator: &dyn Aggregator,
    operations: &[Arc<dyn Operation>],
) -> Result<usize> {
    if operations.is_empty() {
        return Ok(0);
    }

    let mut entities = aggregator.iterator();
    let mut visited = 0;
    while let Some(entity) = entities.try_next().await? {
        for operation in operations {
            operation
                .run(&entity)
                .await
                .with_context(|| format!("operation {} failed on {entity}", operation.name()))?;
        }
        visited += 1;
    }
    Ok(visited)
}
