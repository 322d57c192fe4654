//! Connection pools, schema migrations and first-run database setup.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/herald-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by herald, in the order `db-init` reports them.
pub const HERALD_TABLES: [&str; 4] = ["plans", "endpoints", "deploy_log", "deploy_locks"];

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str, redacted: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to {redacted}"))
}

/// Open the pool used by every herald command.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let redacted = config.redacted_url();
    let pool = connect(&config.database_url, &redacted, MAX_CONNECTIONS).await?;
    debug!(url = %redacted, "connected");
    Ok(pool)
}

/// Apply pending embedded migrations. Already-applied ones are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;
    info!(migrations = MIGRATOR.iter().count(), "schema up to date");
    Ok(())
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists. Returns whether it was created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let db_name = config.validated_database_name()?;
    let maintenance = DbConfig::new(config.maintenance_url());
    let maint_pool = connect(&maintenance.database_url, &maintenance.redacted_url(), 1).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if !exists {
        // The name is a validated identifier; CREATE DATABASE takes no binds.
        maint_pool
            .execute(format!("CREATE DATABASE {db_name}").as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(database = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(!exists)
}

/// Row count of every herald table, in [`HERALD_TABLES`] order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let query = HERALD_TABLES
        .iter()
        .map(|table| format!("SELECT '{table}'::text, COUNT(*) FROM {table}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");

    let counts: Vec<(String, i64)> = sqlx::query_as(&query)
        .fetch_all(pool)
        .await
        .context("failed to count rows in herald tables")?;

    let mut ordered = Vec::with_capacity(HERALD_TABLES.len());
    for table in HERALD_TABLES {
        let count = counts
            .iter()
            .find(|(name, _)| name == table)
            .map_or(0, |(_, count)| *count);
        ordered.push((table.to_string(), count));
    }
    Ok(ordered)
}
