//! `herald log <plan>`: show recent deployment log entries.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use herald_db::queries::deploy_log;

pub async fn run_log(pool: &PgPool, plan_name: &str, limit: i64) -> Result<()> {
    if limit < 1 {
        anyhow::bail!("--limit must be at least 1");
    }

    let entries = deploy_log::list_recent_entries_for_plan(pool, plan_name, limit).await?;
    if entries.is_empty() {
        println!("No deployments recorded.");
        return Ok(());
    }

    for entry in &entries {
        let time = entry.recorded_at.format("%Y-%m-%d %H:%M:%S");
        let id = short_id(&entry.deployment_id);
        match entry.message.as_deref() {
            Some(message) => println!("[{time}] {id} {:<10} {message}", entry.status.to_string()),
            None => println!("[{time}] {id} {}", entry.status),
        }
    }
    Ok(())
}

/// First eight hex digits of a deployment id.
pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
