//! Plans: stored deployment definitions and their live plugin instances.
//!
//! A [`Plan`] is built from a stored row with its compound fields still
//! serialized. [`Plan::load`] unpacks them and materializes the aggregator
//! and processor through the [`PluginRegistry`]; [`Plan::deploy`] (in
//! [`deploy`]) drives a run.

pub mod deploy;
pub mod parser;
pub mod service;
pub mod toml_format;

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;

use herald_db::models::PlanRow;

use crate::aggregator::{Aggregator, EntityMap, EntityStream};
use crate::error::{DeployError, MalformedReason};
use crate::plugin::{PluginConfig, PluginRegistry, with_debug};
use crate::processor::Processor;

pub use deploy::DeployContext;
pub use parser::{PlanParseError, parse_plan_toml};
pub use service::{create_plan_from_toml, load_plan};
pub use toml_format::{PlanMeta, PlanToml, PluginSection};

/// Prefix of the per-plan deployment lock name.
pub const LOCK_PREFIX: &str = "deploy_plan_";

/// What a plugin is told about the plan it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRef {
    pub name: String,
    pub title: String,
    pub debug: bool,
}

/// A compound field that is persisted as JSON text.
///
/// Rows arrive [`Stored::Serialized`]; [`Stored::unpack`] replaces the text
/// with the decoded value once. Empty text decodes to `T::default()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stored<T> {
    Serialized(String),
    Native(T),
}

impl<T: Default> Default for Stored<T> {
    fn default() -> Self {
        Self::Native(T::default())
    }
}

impl<T> Stored<T> {
    /// The decoded value, if already unpacked.
    pub fn native(&self) -> Option<&T> {
        match self {
            Self::Native(value) => Some(value),
            Self::Serialized(_) => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

impl<T: DeserializeOwned + Default> Stored<T> {
    /// Decode in place. A field that is already native is left untouched.
    pub fn unpack(&mut self) -> Result<(), serde_json::Error> {
        if let Self::Serialized(raw) = self {
            let value = if raw.trim().is_empty() {
                T::default()
            } else {
                serde_json::from_str(raw)?
            };
            *self = Self::Native(value);
        }
        Ok(())
    }
}

/// A deployment plan.
///
/// Identity and configuration fields are public; the live plugin instances
/// exist only after [`Plan::load`] and are never persisted.
pub struct Plan {
    pub name: String,
    pub title: String,
    pub description: String,
    /// Forced into both plugin configs as `debug`.
    pub debug: bool,
    pub aggregator_plugin: String,
    pub aggregator_config: Stored<PluginConfig>,
    /// The plan may gather entities but never push them.
    pub fetch_only: bool,
    pub processor_plugin: String,
    pub processor_config: Stored<PluginConfig>,
    /// Endpoint names in deploy/publish order.
    pub endpoints: Stored<Vec<String>>,
    registry: Arc<PluginRegistry>,
    aggregator: Option<Arc<dyn Aggregator>>,
    processor: Option<Box<dyn Processor>>,
}

impl Plan {
    /// An empty, unloaded plan named `name`.
    pub fn new(name: impl Into<String>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: String::new(),
            debug: false,
            aggregator_plugin: String::new(),
            aggregator_config: Stored::default(),
            fetch_only: false,
            processor_plugin: String::new(),
            processor_config: Stored::default(),
            endpoints: Stored::default(),
            registry,
            aggregator: None,
            processor: None,
        }
    }

    /// An unloaded plan from a stored row. Compound fields stay serialized
    /// until [`Plan::load`].
    pub fn from_row(row: PlanRow, registry: Arc<PluginRegistry>) -> Self {
        Self {
            name: row.name,
            title: row.title,
            description: row.description,
            debug: row.debug,
            aggregator_plugin: row.aggregator_plugin,
            aggregator_config: Stored::Serialized(row.aggregator_config),
            fetch_only: row.fetch_only,
            processor_plugin: row.processor_plugin,
            processor_config: Stored::Serialized(row.processor_config),
            endpoints: Stored::Serialized(row.endpoints),
            registry,
            aggregator: None,
            processor: None,
        }
    }

    pub fn plan_ref(&self) -> PlanRef {
        PlanRef {
            name: self.name.clone(),
            title: self.title.clone(),
            debug: self.debug,
        }
    }

    /// Name of the lock held while this plan deploys.
    pub fn lock_name(&self) -> String {
        format!("{LOCK_PREFIX}{}", self.name)
    }

    /// Unpack serialized fields and materialize missing plugins.
    ///
    /// Safe to call repeatedly: fields already native are not decoded again
    /// and plugins already present are not rebuilt.
    pub fn load(&mut self) -> Result<(), DeployError> {
        self.unpack_fields()?;

        if self.aggregator.is_none() && !self.aggregator_plugin.is_empty() {
            let config = with_debug(
                self.aggregator_config.native().cloned().unwrap_or_default(),
                self.debug,
            );
            let aggregator = self
                .registry
                .create_aggregator(&self.aggregator_plugin, &self.plan_ref(), config)
                .ok_or_else(|| {
                    DeployError::malformed(
                        &self.name,
                        MalformedReason::UnknownAggregator(self.aggregator_plugin.clone()),
                    )
                })?
                .with_context(|| {
                    format!(
                        "plan {:?}: failed to construct aggregator {:?}",
                        self.name, self.aggregator_plugin
                    )
                })?;
            tracing::debug!(plan = %self.name, plugin = %self.aggregator_plugin, "aggregator loaded");
            self.aggregator = Some(aggregator);
        }

        if self.processor.is_none() && !self.processor_plugin.is_empty() {
            let config = with_debug(
                self.processor_config.native().cloned().unwrap_or_default(),
                self.debug,
            );
            let processor = self
                .registry
                .create_processor(&self.processor_plugin, self.aggregator.clone(), config)
                .ok_or_else(|| {
                    DeployError::malformed(
                        &self.name,
                        MalformedReason::UnknownProcessor(self.processor_plugin.clone()),
                    )
                })?
                .with_context(|| {
                    format!(
                        "plan {:?}: failed to construct processor {:?}",
                        self.name, self.processor_plugin
                    )
                })?;
            tracing::debug!(plan = %self.name, plugin = %self.processor_plugin, "processor loaded");
            self.processor = Some(processor);
        }

        Ok(())
    }

    fn unpack_fields(&mut self) -> Result<(), DeployError> {
        let name = self.name.clone();
        let invalid = |field: &str, err: serde_json::Error| {
            DeployError::malformed(
                &name,
                MalformedReason::InvalidField {
                    field: field.to_string(),
                    message: err.to_string(),
                },
            )
        };
        self.aggregator_config
            .unpack()
            .map_err(|e| invalid("aggregator_config", e))?;
        self.processor_config
            .unpack()
            .map_err(|e| invalid("processor_config", e))?;
        self.endpoints.unpack().map_err(|e| invalid("endpoints", e))?;
        Ok(())
    }

    /// Whether every configured plugin has been materialized.
    pub fn is_loaded(&self) -> bool {
        (self.aggregator_plugin.is_empty() || self.aggregator.is_some())
            && (self.processor_plugin.is_empty() || self.processor.is_some())
    }

    pub fn aggregator(&self) -> Option<&Arc<dyn Aggregator>> {
        self.aggregator.as_ref()
    }

    pub fn processor(&self) -> Option<&dyn Processor> {
        self.processor.as_deref()
    }

    /// Endpoint names, or an empty slice while still serialized.
    pub fn endpoint_names(&self) -> &[String] {
        self.endpoints.native().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The aggregator's full entity set, loading the plan first if needed.
    pub async fn entities(&mut self) -> Result<EntityMap, DeployError> {
        let aggregator = self.ensure_aggregator()?;
        Ok(aggregator.entities().await?)
    }

    /// Stream the aggregator's entities, loading the plan first if needed.
    pub fn iterator(&mut self) -> Result<EntityStream, DeployError> {
        let aggregator = self.ensure_aggregator()?;
        Ok(aggregator.iterator())
    }

    fn ensure_aggregator(&mut self) -> Result<Arc<dyn Aggregator>, DeployError> {
        if self.aggregator.is_none() {
            self.load()?;
        }
        self.aggregator
            .clone()
            .ok_or_else(|| DeployError::malformed(&self.name, MalformedReason::NoAggregator))
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("debug", &self.debug)
            .field("aggregator_plugin", &self.aggregator_plugin)
            .field("processor_plugin", &self.processor_plugin)
            .field("fetch_only", &self.fetch_only)
            .field("endpoints", &self.endpoints)
            .field("aggregator_loaded", &self.aggregator.is_some())
            .field("processor_loaded", &self.processor.is_some())
            .finish()
    }
}
