//! TOML format types for plan definition files.
//!
//! These types map directly to the `plan.toml` on-disk format and are
//! deserialized via `serde` + the `toml` crate.

use serde::{Deserialize, Serialize};

use crate::plugin::PluginConfig;

/// Top-level structure of a plan definition file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanToml {
    pub plan: PlanMeta,
    /// How entities are gathered. A plan without one cannot list entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<PluginSection>,
    /// How entities are pushed. A plan without one is fetch-only in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<PluginSection>,
}

/// Plan-level metadata in `[plan]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMeta {
    /// Machine name; the plan's stable key.
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub fetch_only: bool,
    /// Endpoint names in deploy order.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// An `[aggregator]` or `[processor]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginSection {
    pub plugin: String,
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub config: toml::Table,
}

impl PluginSection {
    /// The `config` table as a plugin config map.
    pub fn plugin_config(&self) -> Result<PluginConfig, serde_json::Error> {
        serde_json::to_value(&self.config).and_then(serde_json::from_value)
    }
}
