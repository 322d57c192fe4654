//! Database query functions for the `endpoints` table.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::PgPool;

use crate::models::EndpointRow;

/// Parameters for inserting or replacing an endpoint definition.
#[derive(Debug, Clone)]
pub struct NewEndpoint<'a> {
    pub name: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub url: &'a str,
    pub enabled: bool,
    pub config: &'a Value,
}

/// Insert an endpoint, or replace an existing one with the same name.
pub async fn upsert_endpoint(pool: &PgPool, new: &NewEndpoint<'_>) -> Result<EndpointRow> {
    let endpoint = sqlx::query_as::<_, EndpointRow>(
        "INSERT INTO endpoints (name, title, description, url, enabled, config) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (name) DO UPDATE SET \
             title = EXCLUDED.title, \
             description = EXCLUDED.description, \
             url = EXCLUDED.url, \
             enabled = EXCLUDED.enabled, \
             config = EXCLUDED.config \
         RETURNING *",
    )
    .bind(new.name)
    .bind(new.title)
    .bind(new.description)
    .bind(new.url)
    .bind(new.enabled)
    .bind(new.config)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert endpoint {:?}", new.name))?;

    Ok(endpoint)
}

/// Fetch an endpoint by name.
pub async fn get_endpoint(pool: &PgPool, name: &str) -> Result<Option<EndpointRow>> {
    let endpoint = sqlx::query_as::<_, EndpointRow>("SELECT * FROM endpoints WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to fetch endpoint {name:?}"))?;

    Ok(endpoint)
}

/// List all endpoints ordered by name.
pub async fn list_endpoints(pool: &PgPool) -> Result<Vec<EndpointRow>> {
    let endpoints = sqlx::query_as::<_, EndpointRow>("SELECT * FROM endpoints ORDER BY name")
        .fetch_all(pool)
        .await
        .context("failed to list endpoints")?;

    Ok(endpoints)
}

/// Return the subset of `names` that has no row in the `endpoints` table,
/// preserving input order.
pub async fn missing_endpoint_names(pool: &PgPool, names: &[String]) -> Result<Vec<String>> {
    let known: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM endpoints WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(pool)
            .await
            .context("failed to check endpoint names")?;

    Ok(names
        .iter()
        .filter(|name| !known.iter().any(|(k,)| k == *name))
        .cloned()
        .collect())
}

/// Delete an endpoint by name. Returns `true` if a row was removed.
pub async fn delete_endpoint(pool: &PgPool, name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM endpoints WHERE name = $1")
        .bind(name)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete endpoint {name:?}"))?;

    Ok(result.rows_affected() > 0)
}
