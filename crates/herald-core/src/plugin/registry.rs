//! Runtime registry mapping plugin ids to constructors.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use super::PluginConfig;
use crate::aggregator::{Aggregator, ListAggregator};
use crate::deploy_log::DeploymentLog;
use crate::plan::PlanRef;
use crate::processor::{DryRunProcessor, Processor};

/// Builds an aggregator for a plan from its merged config.
pub type AggregatorFactory =
    Arc<dyn Fn(&PlanRef, PluginConfig) -> Result<Arc<dyn Aggregator>> + Send + Sync>;

/// Builds a processor around the plan's aggregator (if any) from its merged
/// config.
pub type ProcessorFactory = Arc<
    dyn Fn(Option<Arc<dyn Aggregator>>, PluginConfig) -> Result<Box<dyn Processor>> + Send + Sync,
>;

/// Factories for every known aggregator and processor plugin, keyed by id.
///
/// # Example
///
/// ```ignore
/// let mut registry = PluginRegistry::new();
/// register_builtins(&mut registry, None);
/// let aggregator = registry.create_aggregator("list", &plan_ref, config);
/// ```
#[derive(Default, Clone)]
pub struct PluginRegistry {
    aggregators: HashMap<String, AggregatorFactory>,
    processors: HashMap<String, ProcessorFactory>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an aggregator factory under `id`.
    ///
    /// Returns `true` if a factory with the same id was replaced.
    pub fn register_aggregator<F>(&mut self, id: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&PlanRef, PluginConfig) -> Result<Arc<dyn Aggregator>> + Send + Sync + 'static,
    {
        self.aggregators
            .insert(id.into(), Arc::new(factory))
            .is_some()
    }

    /// Register a processor factory under `id`.
    ///
    /// Returns `true` if a factory with the same id was replaced.
    pub fn register_processor<F>(&mut self, id: impl Into<String>, factory: F) -> bool
    where
        F: Fn(Option<Arc<dyn Aggregator>>, PluginConfig) -> Result<Box<dyn Processor>>
            + Send
            + Sync
            + 'static,
    {
        self.processors
            .insert(id.into(), Arc::new(factory))
            .is_some()
    }

    pub fn has_aggregator(&self, id: &str) -> bool {
        self.aggregators.contains_key(id)
    }

    pub fn has_processor(&self, id: &str) -> bool {
        self.processors.contains_key(id)
    }

    /// Construct the aggregator registered as `id`.
    ///
    /// Returns `None` if no such plugin is registered.
    pub fn create_aggregator(
        &self,
        id: &str,
        plan: &PlanRef,
        config: PluginConfig,
    ) -> Option<Result<Arc<dyn Aggregator>>> {
        self.aggregators.get(id).map(|factory| factory(plan, config))
    }

    /// Construct the processor registered as `id`.
    ///
    /// Returns `None` if no such plugin is registered.
    pub fn create_processor(
        &self,
        id: &str,
        aggregator: Option<Arc<dyn Aggregator>>,
        config: PluginConfig,
    ) -> Option<Result<Box<dyn Processor>>> {
        self.processors
            .get(id)
            .map(|factory| factory(aggregator, config))
    }

    /// Registered aggregator ids, sorted.
    pub fn aggregator_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.aggregators.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Registered processor ids, sorted.
    pub fn processor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.processors.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("aggregators", &self.aggregator_ids())
            .field("processors", &self.processor_ids())
            .finish()
    }
}

/// Register the built-in `list` aggregator and `dry_run` processor.
///
/// When `log` is given, `dry_run` records `deployed` and `published`
/// entries for each endpoint it handles.
pub fn register_builtins(registry: &mut PluginRegistry, log: Option<Arc<dyn DeploymentLog>>) {
    registry.register_aggregator(ListAggregator::PLUGIN_ID, |plan, config| {
        let aggregator: Arc<dyn Aggregator> = Arc::new(ListAggregator::from_config(plan, &config)?);
        Ok(aggregator)
    });
    registry.register_processor(DryRunProcessor::PLUGIN_ID, move |aggregator, config| {
        let processor: Box<dyn Processor> =
            Box::new(DryRunProcessor::new(aggregator, &config, log.clone())?);
        Ok(processor)
    });
}
