use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status written to the deployment log for one deployment run.
///
/// The orchestrator writes `started`, `processing` and `failed`; processors
/// may write `deployed` and `published` for each endpoint they finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Started,
    Processing,
    Deployed,
    Published,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Started => "started",
            Self::Processing => "processing",
            Self::Deployed => "deployed",
            Self::Published => "published",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for DeploymentStatus {
    type Err = DeploymentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "processing" => Ok(Self::Processing),
            "deployed" => Ok(Self::Deployed),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(DeploymentStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`DeploymentStatus`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid deployment status: {0:?}")]
pub struct DeploymentStatusParseError(pub String);

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A stored plan definition.
///
/// `aggregator_config`, `processor_config` and `endpoints` hold serialized
/// JSON exactly as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanRow {
    pub name: String,
    pub title: String,
    pub description: String,
    pub debug: bool,
    pub aggregator_plugin: String,
    pub aggregator_config: String,
    pub fetch_only: bool,
    pub processor_plugin: String,
    pub processor_config: String,
    pub endpoints: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored endpoint definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EndpointRow {
    pub name: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub enabled: bool,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One status transition in the deployment log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeployLogEntry {
    pub id: i64,
    pub deployment_id: Uuid,
    pub plan_name: String,
    pub status: DeploymentStatus,
    pub message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A held deployment lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeployLock {
    pub name: String,
    pub owner: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
