//! Pre- and post-process extension points.
//!
//! Other modules register [`Operation`] handlers under a [`HookPoint`];
//! the orchestrator hands the registered list to the processor untouched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::aggregator::EntityRef;

/// Where in a deployment run an operation is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreProcess,
    PostProcess,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreProcess => "preprocess",
            Self::PostProcess => "postprocess",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler run by processors once per entity at a hook point.
#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, entity: &EntityRef) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Operation) {}
};

/// Operation handlers by hook point, in registration order.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    hooks: HashMap<HookPoint, Vec<Arc<dyn Operation>>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, point: HookPoint, operation: Arc<dyn Operation>) {
        self.hooks.entry(point).or_default().push(operation);
    }

    /// Handlers for `point`; empty if none are registered.
    pub fn handlers(&self, point: HookPoint) -> &[Arc<dyn Operation>] {
        self.hooks.get(&point).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for point in [HookPoint::PreProcess, HookPoint::PostProcess] {
            let names: Vec<&str> = self.handlers(point).iter().map(|op| op.name()).collect();
            map.entry(&point.as_str(), &names);
        }
        map.finish()
    }
}
