//! The `dry_run` processor: walks the entity set for each endpoint without
//! sending anything.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::TryStreamExt;
use uuid::Uuid;

use super::{Processor, run_operations};
use crate::aggregator::Aggregator;
use crate::deploy_log::{DeploymentLog, DeploymentStatus};
use crate::endpoint::Endpoint;
use crate::operations::Operation;
use crate::plugin::PluginConfig;

pub struct DryRunProcessor {
    aggregator: Arc<dyn Aggregator>,
    debug: bool,
    log: Option<Arc<dyn DeploymentLog>>,
}

impl DryRunProcessor {
    pub const PLUGIN_ID: &str = "dry_run";

    /// Build around the plan's aggregator. Fails if the plan has none.
    pub fn new(
        aggregator: Option<Arc<dyn Aggregator>>,
        config: &PluginConfig,
        log: Option<Arc<dyn DeploymentLog>>,
    ) -> Result<Self> {
        let aggregator =
            aggregator.ok_or_else(|| anyhow!("the dry_run processor requires an aggregator"))?;
        let debug = config
            .get("debug")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(Self {
            aggregator,
            debug,
            log,
        })
    }

    async fn walk(&self, phase: &str, endpoint: &Endpoint) -> Result<usize> {
        let mut entities = self.aggregator.iterator();
        let mut count = 0;
        while let Some(entity) = entities.try_next().await? {
            if self.debug {
                tracing::debug!(phase, endpoint = %endpoint.name, %entity, "dry run");
            }
            count += 1;
        }
        Ok(count)
    }

    async fn note(&self, id: Uuid, status: DeploymentStatus, message: String) -> Result<()> {
        match &self.log {
            Some(log) => log.record(id, status, Some(&message)).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Processor for DryRunProcessor {
    async fn pre_process(&self, operations: &[Arc<dyn Operation>]) -> Result<()> {
        run_operations(self.aggregator.as_ref(), operations).await?;
        Ok(())
    }

    async fn deploy(&self, deployment_id: Uuid, endpoint: &Endpoint, lock_name: &str) -> Result<()> {
        let count = self.walk("deploy", endpoint).await?;
        tracing::info!(
            %deployment_id,
            endpoint = %endpoint.name,
            lock = lock_name,
            entities = count,
            "dry run deploy"
        );
        self.note(
            deployment_id,
            DeploymentStatus::Deployed,
            format!("dry run: {count} entities to {}", endpoint.name),
        )
        .await
    }

    async fn publish(
        &self,
        deployment_id: Uuid,
        endpoint: &Endpoint,
        lock_name: &str,
    ) -> Result<()> {
        let count = self.walk("publish", endpoint).await?;
        tracing::info!(
            %deployment_id,
            endpoint = %endpoint.name,
            lock = lock_name,
            entities = count,
            "dry run publish"
        );
        self.note(
            deployment_id,
            DeploymentStatus::Published,
            format!("dry run: {count} entities on {}", endpoint.name),
        )
        .await
    }

    async fn post_process(&self, operations: &[Arc<dyn Operation>]) -> Result<()> {
        run_operations(self.aggregator.as_ref(), operations).await?;
        Ok(())
    }
}
