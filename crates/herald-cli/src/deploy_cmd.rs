//! `herald deploy <plan>`: run one deployment against PostgreSQL-backed
//! collaborators.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use herald_core::deploy_log::DeploymentLog;
use herald_core::operations::OperationRegistry;
use herald_core::plan::load_plan;
use herald_core::plugin::{PluginRegistry, register_builtins};
use herald_core::postgres::{PgDeploymentLog, PgEndpointResolver, PgLockService};
use herald_core::{DeployContext, DeployError, ErrorKind};
use herald_db::queries::deploy_log;

/// Process exit codes by failure category.
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_MALFORMED_PLAN: i32 = 2;
pub const EXIT_ALREADY_RUNNING: i32 = 3;
pub const EXIT_PLAN_ERROR: i32 = 4;

/// Load `plan_name`, deploy it, and print the run's log entries.
///
/// Deploy failures keep their [`DeployError`] so [`exit_code`] can classify
/// them.
pub async fn run_deploy(pool: &PgPool, plan_name: &str, lock_timeout: Duration) -> Result<Uuid> {
    let log = Arc::new(PgDeploymentLog::new(pool.clone()));

    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry, Some(log.clone() as Arc<dyn DeploymentLog>));

    let mut plan = load_plan(pool, plan_name, Arc::new(registry))
        .await?
        .with_context(|| format!("plan {plan_name:?} not found"))?;

    let resolver = PgEndpointResolver::new(pool.clone());
    let locks = PgLockService::new(pool.clone(), lock_timeout);
    let operations = OperationRegistry::new();
    let ctx = DeployContext {
        resolver: &resolver,
        log: log.as_ref(),
        locks: &locks,
        operations: &operations,
    };

    tracing::debug!(plan = %plan_name, owner = %locks.owner(), "starting deployment");
    let deployment_id = plan.deploy(&ctx).await?;

    for entry in deploy_log::list_entries_for_deployment(pool, deployment_id).await? {
        match entry.message {
            Some(message) => println!("  {:<10}  {message}", entry.status.to_string()),
            None => println!("  {}", entry.status),
        }
    }

    Ok(deployment_id)
}

/// Exit code for an error returned by a command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<DeployError>())
        .map(DeployError::kind);

    match kind {
        Some(ErrorKind::MalformedPlan) => EXIT_MALFORMED_PLAN,
        Some(ErrorKind::AlreadyRunning) => EXIT_ALREADY_RUNNING,
        Some(ErrorKind::PlanError) => EXIT_PLAN_ERROR,
        Some(ErrorKind::Plugin) | None => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::MalformedReason;
    use herald_test_utils::{create_test_db, drop_test_db, seed_endpoint};

    #[test]
    fn malformed_plan_exits_two() {
        let err = anyhow::Error::from(DeployError::MalformedPlan {
            plan: "p".into(),
            reason: MalformedReason::FetchOnly,
        });
        assert_eq!(exit_code(&err), EXIT_MALFORMED_PLAN);
    }

    #[test]
    fn already_running_exits_three() {
        let err = anyhow::Error::from(DeployError::AlreadyRunning { plan: "p".into() });
        assert_eq!(exit_code(&err), EXIT_ALREADY_RUNNING);
    }

    #[test]
    fn endpoint_errors_exit_four() {
        let invalid = anyhow::Error::from(DeployError::InvalidEndpoint {
            plan: "p".into(),
            endpoint: "prod".into(),
        });
        let unselected = anyhow::Error::from(DeployError::NoEndpointSelected { plan: "p".into() });
        assert_eq!(exit_code(&invalid), EXIT_PLAN_ERROR);
        assert_eq!(exit_code(&unselected), EXIT_PLAN_ERROR);
    }

    #[test]
    fn wrapped_deploy_error_is_still_classified() {
        let err = anyhow::Error::from(DeployError::AlreadyRunning { plan: "p".into() })
            .context("deploying p");
        assert_eq!(exit_code(&err), EXIT_ALREADY_RUNNING);
    }

    #[test]
    fn other_errors_exit_one() {
        let plugin = anyhow::Error::from(DeployError::Plugin(anyhow::anyhow!("disk full")));
        assert_eq!(exit_code(&plugin), EXIT_FAILURE);
        assert_eq!(exit_code(&anyhow::anyhow!("plan \"x\" not found")), EXIT_FAILURE);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn run_deploy_missing_plan_fails() {
        let (pool, db_name) = create_test_db().await;
        let err = run_deploy(&pool, "missing", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert_eq!(exit_code(&err), EXIT_FAILURE);
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL"]
    async fn run_deploy_dry_run_plan() {
        let (pool, db_name) = create_test_db().await;
        seed_endpoint(&pool, "staging", "https://staging.example.com").await;

        let plan_toml = herald_core::plan::parse_plan_toml(
            r#"
[plan]
name = "sync"
endpoints = ["staging"]

[aggregator]
plugin = "list"

[aggregator.config.entities.node]
"1" = true

[processor]
plugin = "dry_run"
"#,
        )
        .unwrap();
        let mut registry = PluginRegistry::new();
        register_builtins(&mut registry, None);
        herald_core::plan::create_plan_from_toml(&pool, &plan_toml, &registry)
            .await
            .unwrap();

        let id = run_deploy(&pool, "sync", Duration::from_secs(60))
            .await
            .unwrap();
        let latest = deploy_log::latest_status(&pool, id).await.unwrap();
        assert_eq!(
            latest.map(|s| s.to_string()).as_deref(),
            Some("published")
        );

        drop_test_db(&db_name).await;
    }
}
