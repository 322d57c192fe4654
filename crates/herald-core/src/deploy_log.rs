//! Deployment log contract and an in-memory implementation.
//!
//! A run is opened with [`DeploymentLog::start`], which mints the deployment
//! id used to correlate every later status write of that run.

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use herald_db::models::DeploymentStatus;

/// Append-only status recorder for deployment runs.
#[async_trait]
pub trait DeploymentLog: Send + Sync {
    /// Open a new deployment of `plan_name` with an initial status and
    /// return its id.
    async fn start(&self, plan_name: &str, status: DeploymentStatus) -> Result<Uuid>;

    /// Append a status for an open deployment. `message` carries the error
    /// text for `failed` entries.
    async fn record(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
        message: Option<&str>,
    ) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn DeploymentLog) {}
};

/// One entry recorded by [`MemoryDeploymentLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub deployment_id: Uuid,
    pub plan_name: String,
    pub status: DeploymentStatus,
    pub message: Option<String>,
}

/// Process-local deployment log, kept in write order.
#[derive(Debug, Default)]
pub struct MemoryDeploymentLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryDeploymentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, oldest first.
    pub async fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().await.clone()
    }

    /// Entries of one deployment, oldest first.
    pub async fn entries_for(&self, deployment_id: Uuid) -> Vec<LogEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.deployment_id == deployment_id)
            .cloned()
            .collect()
    }

    /// Statuses of one deployment, oldest first.
    pub async fn statuses_for(&self, deployment_id: Uuid) -> Vec<DeploymentStatus> {
        self.entries_for(deployment_id)
            .await
            .into_iter()
            .map(|e| e.status)
            .collect()
    }
}

#[async_trait]
impl DeploymentLog for MemoryDeploymentLog {
    async fn start(&self, plan_name: &str, status: DeploymentStatus) -> Result<Uuid> {
        let deployment_id = Uuid::new_v4();
        self.entries.lock().await.push(LogEntry {
            deployment_id,
            plan_name: plan_name.to_string(),
            status,
            message: None,
        });
        Ok(deployment_id)
    }

    async fn record(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let Some(plan_name) = entries
            .iter()
            .find(|e| e.deployment_id == deployment_id)
            .map(|e| e.plan_name.clone())
        else {
            bail!("deployment {deployment_id} was never started");
        };
        entries.push(LogEntry {
            deployment_id,
            plan_name,
            status,
            message: message.map(str::to_string),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_then_record_keeps_order_and_plan() {
        let log = MemoryDeploymentLog::new();
        let id = log.start("site-sync", DeploymentStatus::Started).await.unwrap();
        log.record(id, DeploymentStatus::Processing, None).await.unwrap();
        log.record(id, DeploymentStatus::Failed, Some("boom")).await.unwrap();

        let entries = log.entries_for(id).await;
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.plan_name == "site-sync"));
        assert_eq!(entries[2].message.as_deref(), Some("boom"));
        assert_eq!(
            log.statuses_for(id).await,
            vec![
                DeploymentStatus::Started,
                DeploymentStatus::Processing,
                DeploymentStatus::Failed
            ]
        );
    }

    #[tokio::test]
    async fn deployments_get_distinct_ids() {
        let log = MemoryDeploymentLog::new();
        let a = log.start("p", DeploymentStatus::Started).await.unwrap();
        let b = log.start("p", DeploymentStatus::Started).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(log.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn record_for_unknown_deployment_fails() {
        let log = MemoryDeploymentLog::new();
        let err = log
            .record(Uuid::new_v4(), DeploymentStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("never started"));
        assert!(log.entries().await.is_empty());
    }
}
