//! Endpoint descriptors and name resolution.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A deployment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Transport settings for the processor (credentials, format, ...).
    #[serde(default)]
    pub config: Value,
}

fn default_enabled() -> bool {
    true
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: String::new(),
            url: url.into(),
            enabled: true,
            config: Value::Object(Default::default()),
        }
    }

    /// Whether the endpoint can receive deployments.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }
}

/// Outcome of resolving an endpoint name from a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointLookup {
    Found(Endpoint),
    /// Nothing is selected under this name: an empty slot or an unknown
    /// name.
    NotFound,
    /// The endpoint is configured but cannot be used.
    InvalidReference,
}

/// Resolves endpoint names to descriptors.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<EndpointLookup>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn EndpointResolver) {}
};

/// Whether `name` is an empty selection slot.
///
/// Stored endpoint selections may contain `""` or `"0"` for targets that
/// were offered but not picked.
pub fn is_unselected(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name == "0"
}

/// Classify a stored endpoint for a lookup.
pub fn lookup_from(endpoint: Option<Endpoint>) -> EndpointLookup {
    match endpoint {
        None => EndpointLookup::NotFound,
        Some(endpoint) if endpoint.is_usable() => EndpointLookup::Found(endpoint),
        Some(_) => EndpointLookup::InvalidReference,
    }
}

/// In-memory endpoint resolver.
#[derive(Debug, Clone, Default)]
pub struct EndpointDirectory {
    endpoints: HashMap<String, Endpoint>,
}

impl EndpointDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an endpoint. Returns the replaced one, if any.
    pub fn insert(&mut self, endpoint: Endpoint) -> Option<Endpoint> {
        self.endpoints.insert(endpoint.name.clone(), endpoint)
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl FromIterator<Endpoint> for EndpointDirectory {
    fn from_iter<I: IntoIterator<Item = Endpoint>>(iter: I) -> Self {
        let mut directory = Self::new();
        for endpoint in iter {
            directory.insert(endpoint);
        }
        directory
    }
}

#[async_trait]
impl EndpointResolver for EndpointDirectory {
    async fn resolve(&self, name: &str) -> Result<EndpointLookup> {
        if is_unselected(name) {
            return Ok(EndpointLookup::NotFound);
        }
        Ok(lookup_from(self.endpoints.get(name).cloned()))
    }
}
