//! Mapping from kinds to the API resources that serve them.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::{ApiResource, CacheError, ClusterClient, KindKey, ResourceDescriptor, Result};

/// Maps a kind to its backing API resource.
pub trait RestMapper: Send + Sync + fmt::Debug {
    /// Return the resource serving `kind`.
    fn resource_for(&self, kind: &KindKey) -> Result<ResourceDescriptor>;
}

/// A fixed kind-to-resource table.
///
/// # Example
///
/// ```rust
/// use kinformer_core::{KindKey, ResourceDescriptor, RestMapper, StaticRestMapper};
///
/// let pods = KindKey::new("", "v1", "Pod");
/// let mapper = StaticRestMapper::new()
///     .with(pods.clone(), ResourceDescriptor::namespaced("", "v1", "pods"));
///
/// assert_eq!(mapper.resource_for(&pods).unwrap().resource, "pods");
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticRestMapper {
    mappings: HashMap<KindKey, ResourceDescriptor>,
}

impl StaticRestMapper {
    /// Create an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping.
    #[must_use]
    pub fn with(mut self, kind: KindKey, resource: ResourceDescriptor) -> Self {
        self.insert(kind, resource);
        self
    }

    /// Add or replace a mapping.
    pub fn insert(&mut self, kind: KindKey, resource: ResourceDescriptor) {
        self.mappings.insert(kind, resource);
    }

    /// Get the number of mapped kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Check if no kinds are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl FromIterator<ApiResource> for StaticRestMapper {
    fn from_iter<I: IntoIterator<Item = ApiResource>>(iter: I) -> Self {
        Self {
            mappings: iter.into_iter().map(|r| (r.kind, r.resource)).collect(),
        }
    }
}

impl RestMapper for StaticRestMapper {
    fn resource_for(&self, kind: &KindKey) -> Result<ResourceDescriptor> {
        self.mappings
            .get(kind)
            .cloned()
            .ok_or_else(|| CacheError::NoResourceMapping { kind: kind.clone() })
    }
}

/// A mapper built from one discovery call against the cluster.
#[derive(Debug, Clone)]
pub struct DiscoveryRestMapper {
    inner: StaticRestMapper,
}

impl DiscoveryRestMapper {
    /// Run discovery and build the mapping table.
    ///
    /// Errors are returned as the client reported them.
    pub async fn discover(client: &dyn ClusterClient) -> Result<Self> {
        let resources = client.server_resources().await?;
        debug!(resources = resources.len(), "discovered API resources");
        Ok(Self {
            inner: resources.into_iter().collect(),
        })
    }

    /// Get the number of discovered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if discovery returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl RestMapper for DiscoveryRestMapper {
    fn resource_for(&self, kind: &KindKey) -> Result<ResourceDescriptor> {
        self.inner.resource_for(kind)
    }
}
