//! CLI handlers for `herald plan` subcommands.
//!
//! Implements:
//! - `herald plan create <file>`   -- create or replace a plan from a TOML file
//! - `herald plan show [name]`     -- show plan details or list all plans
//! - `herald plan entities <name>` -- list the entities a plan would deploy
//! - `herald plan delete <name>`   -- delete a plan

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use sqlx::PgPool;

use herald_core::plan::{create_plan_from_toml, load_plan, parse_plan_toml};
use herald_core::plugin::{PluginRegistry, register_builtins};
use herald_db::queries::{deploy_log, plans as plan_queries};

use crate::PlanCommands;

/// Log entries shown under `plan show <name>`.
const RECENT_LOG_ENTRIES: i64 = 5;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(command: PlanCommands, pool: &PgPool) -> Result<()> {
    match command {
        PlanCommands::Create { file } => cmd_create(pool, &file).await,
        PlanCommands::Show { name } => match name {
            Some(name) => cmd_show_one(pool, &name).await,
            None => cmd_show_all(pool).await,
        },
        PlanCommands::Entities { name } => cmd_entities(pool, &name).await,
        PlanCommands::Delete { name } => cmd_delete(pool, &name).await,
    }
}

fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry, None);
    registry
}

// -----------------------------------------------------------------------
// herald plan create <file>
// -----------------------------------------------------------------------

/// Read a plan file from disk, parse and validate it, store it, and print a
/// summary.
async fn cmd_create(pool: &PgPool, file_path: &str) -> Result<()> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read plan file: {file_path}"))?;

    let plan_toml = parse_plan_toml(&content)
        .with_context(|| format!("failed to parse plan file: {file_path}"))?;

    let (plan, warnings) = create_plan_from_toml(pool, &plan_toml, &builtin_registry()).await?;

    println!("Plan stored.");
    println!();
    println!("  Name:        {}", plan.name);
    println!("  Aggregator:  {}", or_none(&plan.aggregator_plugin));
    println!("  Processor:   {}", or_none(&plan.processor_plugin));
    println!("  Endpoints:   {}", plan_toml.plan.endpoints.join(", "));

    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------
// herald plan show (list all)
// -----------------------------------------------------------------------

/// List all plans with summary info.
async fn cmd_show_all(pool: &PgPool) -> Result<()> {
    let plans = plan_queries::list_plans(pool).await?;

    if plans.is_empty() {
        println!("No plans found. Use `herald plan create <file>` to create one.");
        return Ok(());
    }

    let name_w = plans.iter().map(|p| p.name.len()).max().unwrap_or(4).max(4);
    let agg_w = plans
        .iter()
        .map(|p| or_none(&p.aggregator_plugin).len())
        .max()
        .unwrap_or(10)
        .max(10);
    let proc_w = plans
        .iter()
        .map(|p| or_none(&p.processor_plugin).len())
        .max()
        .unwrap_or(9)
        .max(9);

    println!(
        "{:<name_w$}  {:<agg_w$}  {:<proc_w$}  UPDATED",
        "NAME", "AGGREGATOR", "PROCESSOR",
    );
    for plan in &plans {
        let updated = plan.updated_at.format("%Y-%m-%d %H:%M");
        println!(
            "{:<name_w$}  {:<agg_w$}  {:<proc_w$}  {}",
            plan.name,
            or_none(&plan.aggregator_plugin),
            or_none(&plan.processor_plugin),
            updated,
        );
    }

    Ok(())
}

// -----------------------------------------------------------------------
// herald plan show <name>
// -----------------------------------------------------------------------

/// Show detailed info for a single plan.
async fn cmd_show_one(pool: &PgPool, name: &str) -> Result<()> {
    let plan = plan_queries::get_plan(pool, name)
        .await?
        .with_context(|| format!("plan {name:?} not found"))?;

    println!("Plan: {}", plan.name);
    if !plan.title.is_empty() {
        println!("  Title:       {}", plan.title);
    }
    println!("  Debug:       {}", plan.debug);
    println!("  Fetch only:  {}", plan.fetch_only);
    println!("  Endpoints:   {}", plan.endpoints);
    println!(
        "  Updated:     {}",
        plan.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let desc = plan.description.trim();
    if !desc.is_empty() {
        println!("  Description:");
        for line in desc.lines() {
            println!("    {line}");
        }
    }

    println!();
    println!("Aggregator: {}", or_none(&plan.aggregator_plugin));
    print_indented(&pretty_json(&plan.aggregator_config));
    println!("Processor: {}", or_none(&plan.processor_plugin));
    print_indented(&pretty_json(&plan.processor_config));

    let entries = deploy_log::list_recent_entries_for_plan(pool, name, RECENT_LOG_ENTRIES).await?;
    if !entries.is_empty() {
        println!();
        println!("Recent log entries:");
        for entry in &entries {
            println!(
                "  [{}] {} {}",
                entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                crate::log_cmd::short_id(&entry.deployment_id),
                entry.status,
            );
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------
// herald plan entities <name>
// -----------------------------------------------------------------------

/// Stream the plan's entities in deploy order.
async fn cmd_entities(pool: &PgPool, name: &str) -> Result<()> {
    let mut plan = load_plan(pool, name, Arc::new(builtin_registry()))
        .await?
        .with_context(|| format!("plan {name:?} not found"))?;

    let mut entities = plan.iterator()?;
    let mut count = 0usize;
    while let Some(entity) = entities.try_next().await? {
        println!("{entity}");
        count += 1;
    }
    if count == 0 {
        println!("Plan {name} has no entities.");
    }
    Ok(())
}

// -----------------------------------------------------------------------
// herald plan delete <name>
// -----------------------------------------------------------------------

async fn cmd_delete(pool: &PgPool, name: &str) -> Result<()> {
    if !plan_queries::delete_plan(pool, name).await? {
        anyhow::bail!("plan {name:?} not found");
    }
    println!("Plan {name} deleted.");
    Ok(())
}

// -----------------------------------------------------------------------
// Formatting helpers
// -----------------------------------------------------------------------

fn or_none(value: &str) -> &str {
    if value.is_empty() { "(none)" } else { value }
}

/// Pretty-print stored JSON text, falling back to the raw text.
fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn print_indented(text: &str) {
    for line in text.lines() {
        println!("  {line}");
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_json_formats_objects() {
        assert_eq!(pretty_json(r#"{"a":1}"#), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn pretty_json_keeps_invalid_text() {
        assert_eq!(pretty_json("not json"), "not json");
    }

    #[test]
    fn empty_plugin_shows_none() {
        assert_eq!(or_none(""), "(none)");
        assert_eq!(or_none("list"), "list");
    }

    #[test]
    fn builtin_registry_knows_builtins() {
        let registry = builtin_registry();
        assert!(registry.has_aggregator("list"));
        assert!(registry.has_processor("dry_run"));
    }
}
