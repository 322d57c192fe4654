mod config;
mod deploy_cmd;
mod endpoint_cmds;
mod log_cmd;
mod plan_cmds;

use clap::{Parser, Subcommand};

use herald_db::pool;

use config::HeraldConfig;

#[derive(Parser)]
#[command(name = "herald", about = "Plan-driven content deployment orchestrator")]
struct Cli {
    /// Database URL (overrides HERALD_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a herald config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/herald")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the herald database (requires config file or env vars)
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Endpoint management
    Endpoint {
        #[command(subcommand)]
        command: EndpointCommands,
    },
    /// Deploy a plan to all of its endpoints
    Deploy {
        /// Plan name to deploy
        plan: String,
    },
    /// Show recent deployment log entries for a plan
    Log {
        /// Plan name
        plan: String,
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create or replace a plan from a TOML file
    Create {
        /// Path to the plan TOML file
        file: String,
    },
    /// Show plan details (or list all plans)
    Show {
        /// Plan name to show (omit to list all)
        name: Option<String>,
    },
    /// List the entities a plan would deploy
    Entities {
        /// Plan name
        name: String,
    },
    /// Delete a plan
    Delete {
        /// Plan name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// Add or update an endpoint
    Add {
        /// Endpoint machine name
        name: String,
        /// Target URL
        #[arg(long)]
        url: String,
        /// Human-readable title (defaults to the name)
        #[arg(long)]
        title: Option<String>,
        /// Register the endpoint disabled
        #[arg(long)]
        disabled: bool,
    },
    /// List all endpoints
    List,
    /// Remove an endpoint
    Remove {
        /// Endpoint machine name
        name: String,
    },
}

/// Execute the `herald init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        deploy: config::DeploySection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!(
        "  deploy.lock_timeout_secs = {}",
        cfg.deploy.lock_timeout_secs
    );
    println!();
    println!("Next: run `herald db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `herald db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = HeraldConfig::resolve(cli_db_url)?;

    println!("Initializing herald database...");

    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database {}.", resolved.db_config.redacted_url());
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("herald db-init complete.");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Plan { command } => {
            let resolved = HeraldConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Endpoint { command } => {
            let resolved = HeraldConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = endpoint_cmds::run_endpoint_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Deploy { plan } => {
            let resolved = HeraldConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = deploy_cmd::run_deploy(&db_pool, &plan, resolved.lock_timeout).await;
            db_pool.close().await;
            let deployment_id = result?;
            println!("Plan {plan} deployed (deployment {deployment_id}).");
        }
        Commands::Log { plan, limit } => {
            let resolved = HeraldConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = log_cmd::run_log(&db_pool, &plan, limit).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(deploy_cmd::exit_code(&e));
    }
}
