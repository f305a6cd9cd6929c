//! Transport seam to the backing cluster API.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{ApiResource, BoxObject, ResourceDescriptor, Result};

/// A change observed on a watch stream.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// An object was created.
    Added(BoxObject),
    /// An object was updated.
    Modified(BoxObject),
    /// An object was deleted.
    Deleted(BoxObject),
    /// No object changed; the stream has progressed to this resource version.
    Bookmark(String),
}

impl WatchEvent {
    /// Short name of the event type, for logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Modified(_) => "modified",
            Self::Deleted(_) => "deleted",
            Self::Bookmark(_) => "bookmark",
        }
    }
}

/// A watch event tagged with the resource version it brings the stream to.
#[derive(Debug, Clone)]
pub struct VersionedEvent {
    /// Resource version after this event.
    pub resource_version: String,
    /// The event.
    pub event: WatchEvent,
}

/// Result of a full list.
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    /// Resource version the list is consistent at.
    pub resource_version: String,
    /// Listed objects.
    pub items: Vec<BoxObject>,
}

/// Stream of watch events. Ends when the server closes the watch.
pub type WatchStream = BoxStream<'static, Result<VersionedEvent>>;

/// Client for the backing cluster API.
///
/// Implementations own connection details and object decoding.
#[async_trait]
pub trait ClusterClient: Send + Sync + fmt::Debug {
    /// Discover every API resource served by the cluster.
    async fn server_resources(&self) -> Result<Vec<ApiResource>>;

    /// List every object of a resource.
    async fn list(&self, resource: &ResourceDescriptor) -> Result<ObjectList>;

    /// Watch a resource for changes after `resource_version`.
    async fn watch(&self, resource: &ResourceDescriptor, resource_version: &str)
        -> Result<WatchStream>;
}
