//! CLI handlers for `herald endpoint` subcommands.

use anyhow::{Result, bail};
use sqlx::PgPool;

use herald_core::plan::parser::is_machine_name;
use herald_db::queries::endpoints::{self, NewEndpoint};

use crate::EndpointCommands;

/// Dispatch an `EndpointCommands` variant to the appropriate handler.
pub async fn run_endpoint_command(command: EndpointCommands, pool: &PgPool) -> Result<()> {
    match command {
        EndpointCommands::Add {
            name,
            url,
            title,
            disabled,
        } => cmd_add(pool, &name, &url, title.as_deref(), !disabled).await,
        EndpointCommands::List => cmd_list(pool).await,
        EndpointCommands::Remove { name } => cmd_remove(pool, &name).await,
    }
}

async fn cmd_add(
    pool: &PgPool,
    name: &str,
    url: &str,
    title: Option<&str>,
    enabled: bool,
) -> Result<()> {
    if !is_machine_name(name) {
        bail!("invalid endpoint name {name:?} (expected lowercase letters, digits, '_' or '-')");
    }
    if url.trim().is_empty() {
        bail!("endpoint URL must not be empty");
    }

    let config = serde_json::json!({});
    let endpoint = endpoints::upsert_endpoint(
        pool,
        &NewEndpoint {
            name,
            title: title.unwrap_or(name),
            description: "",
            url: url.trim(),
            enabled,
            config: &config,
        },
    )
    .await?;

    println!(
        "Endpoint {} -> {} ({})",
        endpoint.name,
        endpoint.url,
        if endpoint.enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let rows = endpoints::list_endpoints(pool).await?;
    if rows.is_empty() {
        println!("No endpoints found. Use `herald endpoint add <name> --url <url>` to add one.");
        return Ok(());
    }

    let name_w = rows.iter().map(|e| e.name.len()).max().unwrap_or(4).max(4);
    println!("{:<name_w$}  {:<8}  URL", "NAME", "STATE");
    for row in &rows {
        let state = if row.enabled { "enabled" } else { "disabled" };
        println!("{:<name_w$}  {:<8}  {}", row.name, state, row.url);
    }
    Ok(())
}

async fn cmd_remove(pool: &PgPool, name: &str) -> Result<()> {
    if !endpoints::delete_endpoint(pool, name).await? {
        bail!("endpoint {name:?} not found");
    }
    println!("Endpoint {name} removed.");
    Ok(())
}
