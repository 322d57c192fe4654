//! Plugin construction: identifier-keyed factories for aggregators and
//! processors, plus their shared configuration map.
//!
//! ```text
//! Plan { aggregator_plugin: "list", processor_plugin: "dry_run", .. }
//!     |
//!     v
//! PluginRegistry --create_aggregator("list", plan_ref, cfg)--> Arc<dyn Aggregator>
//!               --create_processor("dry_run", aggregator, cfg)--> Box<dyn Processor>
//! ```

pub mod registry;

use serde_json::{Map, Value};

pub use registry::{AggregatorFactory, PluginRegistry, ProcessorFactory, register_builtins};

/// Free-form plugin configuration. Valid keys depend on the plugin.
pub type PluginConfig = Map<String, Value>;

/// Return `config` with `debug` set to the plan's flag.
///
/// Every other key is kept as configured; `debug` always follows the plan.
pub fn with_debug(mut config: PluginConfig, debug: bool) -> PluginConfig {
    config.insert("debug".to_string(), Value::Bool(debug));
    config
}
