//! Kind identifiers and resource descriptors.
//!
//! A [`KindKey`] names a category of cluster object by group, version and
//! kind. A [`ResourceDescriptor`] names the API resource that serves it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical identifier for a resource kind.
///
/// The core group is represented by an empty `group` string.
///
/// # Example
///
/// ```rust
/// use kinformer_core::KindKey;
///
/// let deployments = KindKey::new("apps", "v1", "Deployment");
/// assert_eq!(deployments.api_version(), "apps/v1");
///
/// let pods = KindKey::new("", "v1", "Pod");
/// assert_eq!(pods.api_version(), "v1");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KindKey {
    group: String,
    version: String,
    kind: String,
}

impl KindKey {
    /// Create a new kind key.
    #[must_use]
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Parse an `apiVersion` (`group/version` or `version`) plus a kind.
    #[must_use]
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// API group; empty for the core group.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// API version within the group.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Kind name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The `apiVersion` string for this kind.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for KindKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// The API resource backing a kind, as reported by discovery.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// API group; empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Plural resource name, e.g. `deployments`.
    pub resource: String,
    /// Whether objects of this resource live in a namespace.
    pub namespaced: bool,
}

impl ResourceDescriptor {
    /// Create a descriptor for a namespaced resource.
    #[must_use]
    pub fn namespaced(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
            namespaced: true,
        }
    }

    /// Create a descriptor for a cluster-scoped resource.
    #[must_use]
    pub fn cluster_scoped(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            namespaced: false,
            ..Self::namespaced(group, version, resource)
        }
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// A discovered API resource: the kind together with the resource serving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResource {
    /// Kind served by the resource.
    pub kind: KindKey,
    /// Resource descriptor.
    pub resource: ResourceDescriptor,
}

impl ApiResource {
    /// Pair a kind with its resource.
    #[must_use]
    pub fn new(kind: KindKey, resource: ResourceDescriptor) -> Self {
        Self { kind, resource }
    }
}
