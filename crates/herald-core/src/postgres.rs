//! PostgreSQL-backed collaborators.

use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use herald_db::models::EndpointRow;
use herald_db::queries::{deploy_log, endpoints, locks};

use crate::deploy_log::{DeploymentLog, DeploymentStatus};
use crate::endpoint::{Endpoint, EndpointLookup, EndpointResolver, is_unselected, lookup_from};
use crate::lock::LockService;

/// Default time after which a held lock may be taken over.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3600);

/// Deployment locks stored in `deploy_locks`.
///
/// Each service instance has its own owner token; it only releases locks
/// it acquired. A lock older than `timeout` counts as abandoned.
#[derive(Debug, Clone)]
pub struct PgLockService {
    pool: PgPool,
    owner: Uuid,
    timeout: Duration,
}

impl PgLockService {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self {
            pool,
            owner: Uuid::new_v4(),
            timeout,
        }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }
}

#[async_trait]
impl LockService for PgLockService {
    async fn try_acquire(&self, name: &str) -> Result<bool> {
        locks::try_acquire_lock(&self.pool, name, self.owner, self.timeout).await
    }

    async fn release(&self, name: &str) -> Result<()> {
        if !locks::release_lock(&self.pool, name, self.owner).await? {
            tracing::warn!(lock = %name, owner = %self.owner, "lock was not held by this owner");
        }
        Ok(())
    }
}

/// Deployment log stored in `deploy_log`.
#[derive(Debug, Clone)]
pub struct PgDeploymentLog {
    pool: PgPool,
}

impl PgDeploymentLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentLog for PgDeploymentLog {
    async fn start(&self, plan_name: &str, status: DeploymentStatus) -> Result<Uuid> {
        let id = Uuid::new_v4();
        deploy_log::insert_log_entry(&self.pool, id, plan_name, status, None).await?;
        Ok(id)
    }

    async fn record(
        &self,
        deployment_id: Uuid,
        status: DeploymentStatus,
        message: Option<&str>,
    ) -> Result<()> {
        deploy_log::append_status(&self.pool, deployment_id, status, message).await?;
        Ok(())
    }
}

/// Endpoint resolution against the `endpoints` table.
#[derive(Debug, Clone)]
pub struct PgEndpointResolver {
    pool: PgPool,
}

impl PgEndpointResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<EndpointRow> for Endpoint {
    fn from(row: EndpointRow) -> Self {
        Self {
            name: row.name,
            title: row.title,
            description: row.description,
            url: row.url,
            enabled: row.enabled,
            config: row.config,
        }
    }
}

#[async_trait]
impl EndpointResolver for PgEndpointResolver {
    async fn resolve(&self, name: &str) -> Result<EndpointLookup> {
        if is_unselected(name) {
            return Ok(EndpointLookup::NotFound);
        }
        let row = endpoints::get_endpoint(&self.pool, name).await?;
        Ok(lookup_from(row.map(Endpoint::from)))
    }
}

/// Ensure a lock timeout is usable for [`PgLockService`].
pub fn validate_lock_timeout(timeout: Duration) -> Result<Duration> {
    if timeout.is_zero() {
        bail!("lock timeout must be greater than zero");
    }
    Ok(timeout)
}
