//! Aggregator contract: the strategy that decides which entities belong to
//! a plan.
//!
//! Concrete strategies are constructed by the [`crate::plugin::PluginRegistry`]
//! from a plugin id and a [`crate::plugin::PluginConfig`].

pub mod entities;
pub mod list;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

pub use entities::{EntityMap, EntityRef, Inclusion, dependency_order};
pub use list::ListAggregator;

/// A finite stream of entity references.
pub type EntityStream = Pin<Box<dyn Stream<Item = Result<EntityRef>> + Send>>;

/// Strategy for discovering the entities of a plan.
///
/// Object-safe so plans can hold it as `Arc<dyn Aggregator>` and share it
/// with their processor.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Plugin id this aggregator was constructed from.
    fn plugin_id(&self) -> &str;

    /// The full entity set, keyed by entity type then id. See [`Inclusion`]
    /// for the shape of each leaf.
    async fn entities(&self) -> Result<EntityMap>;

    /// Stream the entity set without materializing it.
    ///
    /// Each call starts a new pass if the strategy supports restarting;
    /// otherwise later calls may yield fewer entities.
    fn iterator(&self) -> EntityStream;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Aggregator) {}
};
