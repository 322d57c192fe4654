//! End-to-end tests for the `herald` binary.
//!
//! Tests that need a database are ignored by default; they share the
//! PostgreSQL server from `herald-test-utils`.

use std::path::Path;
use std::process::{Command, Output};

use herald_test_utils::{create_test_db, drop_test_db, pg_url};
use tempfile::TempDir;

fn herald(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_herald"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env_remove("HERALD_DATABASE_URL")
        .env_remove("HERALD_LOCK_TIMEOUT_SECS")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run herald binary")
}

fn herald_on(config_home: &Path, db_url: &str, args: &[&str]) -> Output {
    let mut full = vec!["--database-url", db_url];
    full.extend_from_slice(args);
    herald(config_home, &full)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// -----------------------------------------------------------------------
// herald init
// -----------------------------------------------------------------------

#[test]
fn init_writes_config_and_refuses_overwrite() {
    let home = TempDir::new().unwrap();

    let first = herald(home.path(), &["init", "--db-url", "postgresql://h:5432/herald"]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let written = std::fs::read_to_string(home.path().join("herald/config.toml")).unwrap();
    assert!(written.contains("postgresql://h:5432/herald"));
    assert!(written.contains("lock_timeout_secs = 3600"));

    let second = herald(home.path(), &["init"]);
    assert_eq!(second.status.code(), Some(1));
    assert!(stderr(&second).contains("--force"));

    let forced = herald(home.path(), &["init", "--force", "--db-url", "postgresql://other/db"]);
    assert!(forced.status.success());
    let written = std::fs::read_to_string(home.path().join("herald/config.toml")).unwrap();
    assert!(written.contains("postgresql://other/db"));
}

#[test]
fn bad_lock_timeout_fails_before_connecting() {
    let home = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_herald"))
        .args(["deploy", "site-sync"])
        .env("XDG_CONFIG_HOME", home.path())
        .env("HERALD_LOCK_TIMEOUT_SECS", "soon")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("HERALD_LOCK_TIMEOUT_SECS"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    let output = herald(home.path(), &["publish"]);
    assert!(!output.status.success());
}

// -----------------------------------------------------------------------
// Full workflow against PostgreSQL
// -----------------------------------------------------------------------

const PLAN: &str = r#"
[plan]
name = "site-sync"
endpoints = ["staging", "prod"]

[aggregator]
plugin = "list"

[aggregator.config.entities.node]
"7" = true
"8" = true

[processor]
plugin = "dry_run"
"#;

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn create_deploy_and_log_workflow() {
    let (pool, db_name) = create_test_db().await;
    let db_url = format!("{}/{db_name}", pg_url().await);
    let home = TempDir::new().unwrap();
    let plan_file = home.path().join("site-sync.toml");
    std::fs::write(&plan_file, PLAN).unwrap();
    let plan_path = plan_file.to_str().unwrap();
    let run = |args: &[&str]| herald_on(home.path(), &db_url, args);

    let created = run(&["plan", "create", plan_path]);
    assert!(created.status.success(), "stderr: {}", stderr(&created));
    assert!(stdout(&created).contains("endpoint \"staging\" does not exist"));

    for (name, url) in [("staging", "https://staging.example.com"), ("prod", "https://prod.example.com")] {
        let added = run(&["endpoint", "add", name, "--url", url]);
        assert!(added.status.success(), "stderr: {}", stderr(&added));
    }

    let entities = run(&["plan", "entities", "site-sync"]);
    assert!(entities.status.success());
    assert_eq!(stdout(&entities).lines().count(), 2);

    let deployed = run(&["deploy", "site-sync"]);
    assert!(deployed.status.success(), "stderr: {}", stderr(&deployed));
    assert!(stdout(&deployed).contains("Plan site-sync deployed"));

    let log = run(&["log", "site-sync"]);
    assert!(log.status.success());
    let log_out = stdout(&log);
    assert!(log_out.contains("started"));
    assert_eq!(log_out.matches("published").count(), 2);

    let shown = run(&["plan", "show"]);
    assert!(stdout(&shown).contains("site-sync"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn deploy_exit_codes() {
    let (pool, db_name) = create_test_db().await;
    let db_url = format!("{}/{db_name}", pg_url().await);
    let home = TempDir::new().unwrap();
    let run = |args: &[&str]| herald_on(home.path(), &db_url, args);

    let fetch_only = home.path().join("fetch.toml");
    std::fs::write(&fetch_only, PLAN.replace("[plan]\n", "[plan]\nfetch_only = true\n")).unwrap();
    assert!(run(&["plan", "create", fetch_only.to_str().unwrap()]).status.success());
    assert_eq!(run(&["deploy", "site-sync"]).status.code(), Some(2));

    let disabled = home.path().join("disabled.toml");
    std::fs::write(&disabled, PLAN).unwrap();
    assert!(run(&["plan", "create", disabled.to_str().unwrap()]).status.success());
    assert!(run(&["endpoint", "add", "staging", "--url", "https://s", "--disabled"]).status.success());
    assert_eq!(run(&["deploy", "site-sync"]).status.code(), Some(4));

    assert_eq!(run(&["deploy", "missing"]).status.code(), Some(1));

    pool.close().await;
    drop_test_db(&db_name).await;
}
