//! Configuration file management for herald.
//!
//! Provides a TOML-based config file at `~/.config/herald/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use herald_db::config::DbConfig;

/// Environment variable overriding `[deploy] lock_timeout_secs`.
pub const LOCK_TIMEOUT_ENV: &str = "HERALD_LOCK_TIMEOUT_SECS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub deploy: DeploySection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeploySection {
    /// Seconds after which a deployment lock is considered abandoned.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

fn default_lock_timeout_secs() -> u64 {
    3600
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the herald config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/herald` or `~/.config/herald`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("herald");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("herald")
}

/// Return the path to the herald config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The database URL may carry a password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct HeraldConfig {
    pub db_config: DbConfig,
    pub lock_timeout: Duration,
}

impl HeraldConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `HERALD_DATABASE_URL` env > `config_file.database.url` > `DbConfig::DEFAULT_URL`
    /// - Lock timeout: `HERALD_LOCK_TIMEOUT_SECS` env > `config_file.deploy.lock_timeout_secs` > 3600
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let lock_timeout_secs = if let Ok(raw) = std::env::var(LOCK_TIMEOUT_ENV) {
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{LOCK_TIMEOUT_ENV} is not a number of seconds: {raw:?}"))?
        } else if let Some(ref cfg) = file_config {
            cfg.deploy.lock_timeout_secs
        } else {
            default_lock_timeout_secs()
        };
        if lock_timeout_secs == 0 {
            bail!("lock timeout must be at least one second");
        }

        Ok(Self {
            db_config: DbConfig::new(db_url),
            lock_timeout: Duration::from_secs(lock_timeout_secs),
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point `XDG_CONFIG_HOME` at an empty temp dir for the guard's lifetime.
    struct IsolatedConfig {
        dir: tempfile::TempDir,
        orig_xdg: Option<String>,
    }

    impl IsolatedConfig {
        fn new() -> Self {
            let dir = tempfile::TempDir::new().unwrap();
            let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
            unsafe { std::env::set_var("XDG_CONFIG_HOME", dir.path()) };
            unsafe { std::env::remove_var(DbConfig::ENV_VAR) };
            unsafe { std::env::remove_var(LOCK_TIMEOUT_ENV) };
            Self { dir, orig_xdg }
        }
    }

    impl Drop for IsolatedConfig {
        fn drop(&mut self) {
            match self.orig_xdg.take() {
                Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
                None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
            }
            unsafe { std::env::remove_var(DbConfig::ENV_VAR) };
            unsafe { std::env::remove_var(LOCK_TIMEOUT_ENV) };
        }
    }

    fn sample(url: &str, lock_timeout_secs: u64) -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: url.to_string(),
            },
            deploy: DeploySection { lock_timeout_secs },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let isolated = IsolatedConfig::new();

        save_config(&sample("postgresql://testhost:5432/testdb", 120)).unwrap();

        assert!(config_path().starts_with(isolated.dir.path()));
        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, "postgresql://testhost:5432/testdb");
        assert_eq!(loaded.deploy.lock_timeout_secs, 120);
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let _isolated = IsolatedConfig::new();

        save_config(&sample("postgresql://localhost/herald", 3600)).unwrap();

        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn deploy_section_is_optional() {
        let config: ConfigFile =
            toml::from_str("[database]\nurl = \"postgresql://h/db\"\n").unwrap();
        assert_eq!(config.deploy.lock_timeout_secs, 3600);
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        let _isolated = IsolatedConfig::new();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };

        let config = HeraldConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        let _isolated = IsolatedConfig::new();
        save_config(&sample("postgresql://file:5432/filedb", 60)).unwrap();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(LOCK_TIMEOUT_ENV, "90") };

        let config = HeraldConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.lock_timeout, Duration::from_secs(90));
    }

    #[test]
    fn resolve_reads_config_file() {
        let _lock = lock_env();
        let _isolated = IsolatedConfig::new();
        save_config(&sample("postgresql://file:5432/filedb", 60)).unwrap();

        let config = HeraldConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://file:5432/filedb");
        assert_eq!(config.lock_timeout, Duration::from_secs(60));
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        let _isolated = IsolatedConfig::new();

        let config = HeraldConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.lock_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn resolve_rejects_bad_lock_timeout() {
        let _lock = lock_env();
        let _isolated = IsolatedConfig::new();

        unsafe { std::env::set_var(LOCK_TIMEOUT_ENV, "soon") };
        let err = HeraldConfig::resolve(None).unwrap_err();
        assert!(err.to_string().contains(LOCK_TIMEOUT_ENV), "{err}");

        unsafe { std::env::set_var(LOCK_TIMEOUT_ENV, "0") };
        assert!(HeraldConfig::resolve(None).is_err());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("herald/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
