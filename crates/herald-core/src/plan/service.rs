//! Plan service layer.
//!
//! Stores plan definitions parsed from TOML and rebuilds unloaded [`Plan`]s
//! from stored rows.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;

use herald_db::models::PlanRow;
use herald_db::queries::{endpoints as endpoint_queries, plans as plan_queries};

use super::Plan;
use super::toml_format::{PlanToml, PluginSection};
use crate::plugin::{PluginConfig, PluginRegistry};

/// Create or replace a plan from a parsed and validated [`PlanToml`].
///
/// Config tables and the endpoint list are stored serialized. Returns the
/// stored row and warnings for references that do not resolve yet:
/// plugin ids missing from `registry` and endpoints missing from the
/// endpoint table. Warnings do not prevent the plan from being stored.
pub async fn create_plan_from_toml(
    pool: &PgPool,
    plan_toml: &PlanToml,
    registry: &PluginRegistry,
) -> Result<(PlanRow, Vec<String>)> {
    let meta = &plan_toml.plan;
    let (aggregator_plugin, aggregator_config) = section_parts(plan_toml.aggregator.as_ref())
        .with_context(|| format!("plan {:?}: invalid aggregator config", meta.name))?;
    let (processor_plugin, processor_config) = section_parts(plan_toml.processor.as_ref())
        .with_context(|| format!("plan {:?}: invalid processor config", meta.name))?;
    let endpoints = serde_json::to_string(&meta.endpoints)?;

    let mut warnings = Vec::new();
    if !aggregator_plugin.is_empty() && !registry.has_aggregator(aggregator_plugin) {
        warnings.push(format!(
            "aggregator plugin {aggregator_plugin:?} is not registered"
        ));
    }
    if !processor_plugin.is_empty() && !registry.has_processor(processor_plugin) {
        warnings.push(format!(
            "processor plugin {processor_plugin:?} is not registered"
        ));
    }
    for name in endpoint_queries::missing_endpoint_names(pool, &meta.endpoints).await? {
        warnings.push(format!("endpoint {name:?} does not exist"));
    }

    let row = plan_queries::upsert_plan(
        pool,
        &plan_queries::NewPlan {
            name: &meta.name,
            title: &meta.title,
            description: &meta.description,
            debug: meta.debug,
            aggregator_plugin,
            aggregator_config: &aggregator_config,
            fetch_only: meta.fetch_only,
            processor_plugin,
            processor_config: &processor_config,
            endpoints: &endpoints,
        },
    )
    .await
    .with_context(|| format!("failed to store plan {:?}", meta.name))?;

    for warning in &warnings {
        tracing::warn!(plan = %row.name, "{warning}");
    }

    Ok((row, warnings))
}

/// Plugin id and serialized config of an optional plugin section.
fn section_parts(section: Option<&PluginSection>) -> Result<(&str, String)> {
    let (plugin, config) = match section {
        Some(section) => (section.plugin.trim(), section.plugin_config()?),
        None => ("", PluginConfig::new()),
    };
    Ok((plugin, serde_json::to_string(&config)?))
}

/// Fetch a stored plan as an unloaded [`Plan`].
///
/// Returns `None` if no plan has that name.
pub async fn load_plan(
    pool: &PgPool,
    name: &str,
    registry: Arc<PluginRegistry>,
) -> Result<Option<Plan>> {
    let row = plan_queries::get_plan(pool, name).await?;
    Ok(row.map(|row| Plan::from_row(row, registry)))
}
