//! The `list` aggregator: an entity set declared inline in plan config.
//!
//! ```toml
//! [aggregator]
//! plugin = "list"
//!
//! [aggregator.config.entities.node]
//! "7" = true
//!
//! [aggregator.config.entities.file."12".node]
//! "7" = true
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Aggregator, EntityMap, EntityStream, dependency_order};
use crate::plan::PlanRef;
use crate::plugin::PluginConfig;

/// Aggregator over a fixed entity map read from the `entities` config key.
#[derive(Debug, Clone)]
pub struct ListAggregator {
    plan: PlanRef,
    entities: EntityMap,
}

impl ListAggregator {
    pub const PLUGIN_ID: &str = "list";

    /// Build from plan config. A missing `entities` key is an empty set.
    pub fn from_config(plan: &PlanRef, config: &PluginConfig) -> Result<Self> {
        let entities = match config.get("entities") {
            Some(value) => serde_json::from_value(value.clone()).with_context(|| {
                format!(
                    "plan {:?}: `entities` is not a valid entity map",
                    plan.name
                )
            })?,
            None => EntityMap::new(),
        };

        if config.get("debug").and_then(|v| v.as_bool()).unwrap_or(false) {
            tracing::debug!(
                plan = %plan.name,
                entity_types = entities.len(),
                "list aggregator configured"
            );
        }

        Ok(Self {
            plan: plan.clone(),
            entities,
        })
    }

    /// The plan this aggregator was built for.
    pub fn plan(&self) -> &PlanRef {
        &self.plan
    }
}

#[async_trait]
impl Aggregator for ListAggregator {
    fn plugin_id(&self) -> &str {
        Self::PLUGIN_ID
    }

    async fn entities(&self) -> Result<EntityMap> {
        Ok(self.entities.clone())
    }

    fn iterator(&self) -> EntityStream {
        let ordered = dependency_order(&self.entities);
        Box::pin(futures::stream::iter(ordered.into_iter().map(Ok)))
    }
}
