//! Read API over cached objects.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kinformer_core::{BoxObject, KindKey, Object, ObjectKey, Result};

/// Reads objects from a cache.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Fetch one object by key.
    ///
    /// Fails with [`CacheError::NotFound`](kinformer_core::CacheError::NotFound)
    /// if the cache does not hold it.
    async fn get(&self, kind: &KindKey, key: &ObjectKey) -> Result<BoxObject>;

    /// List the objects of `kind` matching `options`, ordered by key.
    async fn list(&self, kind: &KindKey, options: &ListOptions) -> Result<Vec<BoxObject>>;
}

/// Filters for [`Reader::list`].
///
/// # Example
///
/// ```rust
/// use kinformer::ListOptions;
///
/// let options = ListOptions::new()
///     .in_namespace("prod")
///     .matching_field("spec.nodeName", "node-1")
///     .matching_label("app", "web");
/// assert_eq!(options.namespace(), Some("prod"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    namespace: Option<String>,
    field: Option<(String, String)>,
    labels: BTreeMap<String, String>,
}

impl ListOptions {
    /// Match everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only objects in `namespace`.
    ///
    /// An empty namespace matches every namespace.
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Only objects whose indexed `field` has `value`.
    ///
    /// The field must be registered with `index_field` first.
    #[must_use]
    pub fn matching_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field = Some((field.into(), value.into()));
        self
    }

    /// Only objects carrying label `key=value`. Repeatable; all must match.
    #[must_use]
    pub fn matching_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Namespace filter. `None` when listing across namespaces.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Field filter as `(field, value)`.
    pub fn field(&self) -> Option<(&str, &str)> {
        self.field.as_ref().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    /// Label filters.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Whether `obj` carries every required label.
    pub fn matches_labels(&self, obj: &dyn Object) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        let Some(labels) = obj.labels() else {
            return false;
        };
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|have| have == v))
    }
}
