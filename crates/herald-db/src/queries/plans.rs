//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::PlanRow;

/// Parameters for inserting or replacing a plan definition.
///
/// The config and endpoint fields are already serialized JSON.
#[derive(Debug, Clone)]
pub struct NewPlan<'a> {
    pub name: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub debug: bool,
    pub aggregator_plugin: &'a str,
    pub aggregator_config: &'a str,
    pub fetch_only: bool,
    pub processor_plugin: &'a str,
    pub processor_config: &'a str,
    pub endpoints: &'a str,
}

/// Insert a plan, or replace the definition of an existing plan with the
/// same name. `created_at` is preserved on replace.
pub async fn upsert_plan(pool: &PgPool, new: &NewPlan<'_>) -> Result<PlanRow> {
    let plan = sqlx::query_as::<_, PlanRow>(
        "INSERT INTO plans (name, title, description, debug, aggregator_plugin, \
                            aggregator_config, fetch_only, processor_plugin, \
                            processor_config, endpoints) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (name) DO UPDATE SET \
             title = EXCLUDED.title, \
             description = EXCLUDED.description, \
             debug = EXCLUDED.debug, \
             aggregator_plugin = EXCLUDED.aggregator_plugin, \
             aggregator_config = EXCLUDED.aggregator_config, \
             fetch_only = EXCLUDED.fetch_only, \
             processor_plugin = EXCLUDED.processor_plugin, \
             processor_config = EXCLUDED.processor_config, \
             endpoints = EXCLUDED.endpoints, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(new.name)
    .bind(new.title)
    .bind(new.description)
    .bind(new.debug)
    .bind(new.aggregator_plugin)
    .bind(new.aggregator_config)
    .bind(new.fetch_only)
    .bind(new.processor_plugin)
    .bind(new.processor_config)
    .bind(new.endpoints)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert plan {:?}", new.name))?;

    Ok(plan)
}

/// Fetch a plan by name.
pub async fn get_plan(pool: &PgPool, name: &str) -> Result<Option<PlanRow>> {
    let plan = sqlx::query_as::<_, PlanRow>("SELECT * FROM plans WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch plan {name:?}"))?;

    Ok(plan)
}

/// List all plans ordered by name.
pub async fn list_plans(pool: &PgPool) -> Result<Vec<PlanRow>> {
    let plans = sqlx::query_as::<_, PlanRow>("SELECT * FROM plans ORDER BY name")
        .fetch_all(pool)
        .await
        .context("failed to list plans")?;

    Ok(plans)
}

/// Delete a plan by name. Returns `true` if a row was removed.
pub async fn delete_plan(pool: &PgPool, name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM plans WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete plan {name:?}"))?;

    Ok(result.rows_affected() > 0)
}
