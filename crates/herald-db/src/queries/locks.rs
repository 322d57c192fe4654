//! Database query functions for the `deploy_locks` table.
//!
//! A lock row is held by an owner token until it is released or its
//! `expires_at` passes; an expired row may be taken over by any owner.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::DeployLock;

/// Try to take the named lock for `owner`. Never waits.
///
/// Returns `true` if the lock is now held by `owner`. Returns `false` if it
/// is held by anyone (including `owner`) and has not expired.
pub async fn try_acquire_lock(
    pool: &PgPool,
    name: &str,
    owner: Uuid,
    timeout: Duration,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO deploy_locks (name, owner, expires_at) \
         VALUES ($1, $2, now() + make_interval(secs => $3)) \
         ON CONFLICT (name) DO UPDATE SET \
             owner = EXCLUDED.owner, \
             acquired_at = now(), \
             expires_at = EXCLUDED.expires_at \
         WHERE deploy_locks.expires_at < now()",
    )
    .bind(name)
    .bind(owner)
    .bind(timeout.as_secs_f64())
    .execute(pool)
    .await
    .with_context(|| format!("failed to acquire lock {name:?}"))?;

    Ok(result.rows_affected() == 1)
}

/// Release the named lock if `owner` holds it. Returns `true` if a row was
/// removed.
pub async fn release_lock(pool: &PgPool, name: &str, owner: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM deploy_locks WHERE name = $1 AND owner = $2")
        .bind(name)
        .bind(owner)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release lock {name:?}"))?;

    Ok(result.rows_affected() > 0)
}

/// Fetch the lock row for `name`, expired or not.
pub async fn get_lock(pool: &PgPool, name: &str) -> Result<Option<DeployLock>> {
    let lock = sqlx::query_as::<_, DeployLock>("SELECT * FROM deploy_locks WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch lock {name:?}"))?;

    Ok(lock)
}
