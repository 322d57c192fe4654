//! Database query functions for the `deploy_log` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DeployLogEntry, DeploymentStatus};

/// Append a status entry for a deployment.
pub async fn insert_log_entry(
    pool: &PgPool,
    deployment_id: Uuid,
    plan_name: &str,
    status: DeploymentStatus,
    message: Option<&str>,
) -> Result<DeployLogEntry> {
    let entry = sqlx::query_as::<_, DeployLogEntry>(
        "INSERT INTO deploy_log (deployment_id, plan_name, status, message) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(deployment_id)
    .bind(plan_name)
    .bind(status)
    .bind(message)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!("failed to insert {status} log entry for deployment {deployment_id}")
    })?;

    Ok(entry)
}

/// Append a status entry for a deployment that already has a `started`
/// entry, reusing its plan name.
pub async fn append_status(
    pool: &PgPool,
    deployment_id: Uuid,
    status: DeploymentStatus,
    message: Option<&str>,
) -> Result<DeployLogEntry> {
    let entry = sqlx::query_as::<_, DeployLogEntry>(
        "INSERT INTO deploy_log (deployment_id, plan_name, status, message) \
         SELECT $1, plan_name, $2, $3 FROM deploy_log \
         WHERE deployment_id = $1 \
         ORDER BY id ASC \
         LIMIT 1 \
         RETURNING *",
    )
    .bind(deployment_id)
    .bind(status)
    .bind(message)
    .fetch_optional(pool)
    .await
    .with_context(|| {
        format!("failed to append {status} log entry for deployment {deployment_id}")
    })?;

    entry.with_context(|| format!("deployment {deployment_id} has no log entries"))
}

/// All entries of one deployment, oldest first.
pub async fn list_entries_for_deployment(
    pool: &PgPool,
    deployment_id: Uuid,
) -> Result<Vec<DeployLogEntry>> {
    let entries = sqlx::query_as::<_, DeployLogEntry>(
        "SELECT * FROM deploy_log WHERE deployment_id = $1 ORDER BY id ASC",
    )
    .bind(deployment_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list log entries for deployment {deployment_id}"))?;

    Ok(entries)
}

/// The most recent `limit` entries for a plan, oldest first.
pub async fn list_recent_entries_for_plan(
    pool: &PgPool,
    plan_name: &str,
    limit: i64,
) -> Result<Vec<DeployLogEntry>> {
    let mut entries = sqlx::query_as::<_, DeployLogEntry>(
        "SELECT * FROM deploy_log WHERE plan_name = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(plan_name)
    .bind(limit)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list log entries for plan {plan_name:?}"))?;

    entries.reverse();
    Ok(entries)
}

/// Latest status of a deployment, if it has any entries.
pub async fn latest_status(
    pool: &PgPool,
    deployment_id: Uuid,
) -> Result<Option<DeploymentStatus>> {
    let status = sqlx::query_scalar::<_, DeploymentStatus>(
        "SELECT status FROM deploy_log WHERE deployment_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(deployment_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch latest status of deployment {deployment_id}"))?;

    Ok(status)
}
