//! PostgreSQL fixtures for herald integration tests.
//!
//! One server is shared by every test in a binary; each test works in its
//! own freshly migrated database.
//!
//! The server comes from `HERALD_TEST_PG_URL` when set (for example a
//! container started by a CI setup step). Otherwise a `postgres` container
//! is started through testcontainers on first use and kept for the life of
//! the test binary.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use herald_db::models::EndpointRow;
use herald_db::pool;
use herald_db::queries::endpoints::{NewEndpoint, upsert_endpoint};

/// Environment variable naming an already running server.
pub const PG_URL_ENV: &str = "HERALD_TEST_PG_URL";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

struct Server {
    base_url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(base_url) = std::env::var(PG_URL_ENV) {
        return Server {
            base_url: base_url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16")
        .start()
        .await
        .expect("failed to start PostgreSQL container");
    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    Server {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Server URL without a database path.
pub async fn pg_url() -> &'static str {
    &SERVER.get_or_init(start_server).await.base_url
}

async fn connect(url: &str, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect(url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {url}: {e}"))
}

/// Create a uniquely named database with migrations applied.
///
/// Returns the pool and the database name to pass to [`drop_test_db`].
pub async fn create_test_db() -> (PgPool, String) {
    let base_url = pg_url().await;
    let db_name = format!("herald_test_{}", Uuid::new_v4().simple());

    let maintenance = connect(&format!("{base_url}/postgres"), 1).await;
    maintenance
        .execute(format!("CREATE DATABASE {db_name}").as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create test database {db_name}: {e}"));
    maintenance.close().await;

    let pool = connect(&format!("{base_url}/{db_name}"), 5).await;
    pool::run_migrations(&pool)
        .await
        .expect("migrations should succeed");
    (pool, db_name)
}

/// Drop a database made by [`create_test_db`], disconnecting its clients.
pub async fn drop_test_db(db_name: &str) {
    let base_url = pg_url().await;
    let maintenance = connect(&format!("{base_url}/postgres"), 1).await;
    let _ = maintenance
        .execute(
            format!(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                 WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
            )
            .as_str(),
        )
        .await;
    let _ = maintenance
        .execute(format!("DROP DATABASE IF EXISTS {db_name}").as_str())
        .await;
    maintenance.close().await;
}

/// Insert an enabled endpoint with an empty config.
pub async fn seed_endpoint(pool: &PgPool, name: &str, url: &str) -> EndpointRow {
    let config = serde_json::json!({});
    upsert_endpoint(
        pool,
        &NewEndpoint {
            name,
            title: name,
            description: "",
            url,
            enabled: true,
            config: &config,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("failed to seed endpoint {name}: {e}"))
}
