//! Cached object trait and a schemaless object type.
//!
//! This module provides the [`Object`] trait implemented by everything the
//! cache stores, and [`DynamicObject`] for kinds without a Rust type.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::KindKey;

/// Trait for objects held in a cache.
///
/// # Example
///
/// ```rust
/// use kinformer_core::Object;
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct Node {
///     name: String,
/// }
///
/// impl Object for Node {
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait Object: Send + Sync + fmt::Debug {
    /// Object name, unique within its namespace.
    fn name(&self) -> &str;

    /// Namespace, or `None` for cluster-scoped objects.
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Kind carried by the object itself, if any.
    ///
    /// Typed objects usually leave this unset and are resolved through a
    /// [`Scheme`](crate::Scheme).
    fn kind(&self) -> Option<&KindKey> {
        None
    }

    /// Object labels.
    fn labels(&self) -> Option<&BTreeMap<String, String>> {
        None
    }

    /// Convert to Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a cached object.
pub type BoxObject = Arc<dyn Object>;

/// Downcast a cached object to its concrete type.
#[must_use]
pub fn downcast<T: Object + 'static>(obj: &BoxObject) -> Option<&T> {
    obj.as_any().downcast_ref::<T>()
}

/// Store key of an object: `namespace/name`, or `name` when cluster-scoped.
#[must_use]
pub fn object_key(obj: &dyn Object) -> String {
    ObjectKey::of(obj).to_string()
}

/// Namespace and name of an object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace, or `None` for cluster-scoped objects.
    pub namespace: Option<String>,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Key for a namespaced object.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key for a cluster-scoped object.
    #[must_use]
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of an existing object.
    #[must_use]
    pub fn of(obj: &dyn Object) -> Self {
        Self {
            namespace: obj.namespace().map(str::to_string),
            name: obj.name().to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => write!(f, "{}/{}", ns, self.name),
            _ => f.write_str(&self.name),
        }
    }
}

/// An object of any kind, carrying its kind and a JSON body.
///
/// # Example
///
/// ```rust
/// use kinformer_core::{DynamicObject, KindKey, Object};
///
/// let pod = DynamicObject::new(KindKey::new("", "v1", "Pod"), "web-0")
///     .within("default")
///     .label("app", "web");
///
/// assert_eq!(pod.namespace(), Some("default"));
/// assert_eq!(pod.labels().unwrap()["app"], "web");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    /// Kind of the object.
    pub kind: KindKey,
    /// Object name.
    pub name: String,
    /// Namespace, if namespaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Everything else.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Create an object with no namespace, labels or data.
    #[must_use]
    pub fn new(kind: KindKey, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
            labels: BTreeMap::new(),
            data: serde_json::Value::Null,
        }
    }

    /// Place the object in a namespace.
    #[must_use]
    pub fn within(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Look up a dotted path (`spec.nodeName`) in the body.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.')
            .try_fold(&self.data, |value, segment| value.get(segment))
    }

    /// Look up a dotted path and return it as a string.
    #[must_use]
    pub fn field_str(&self, path: &str) -> Option<&str> {
        self.field(path).and_then(serde_json::Value::as_str)
    }
}

impl Object for DynamicObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn kind(&self) -> Option<&KindKey> {
        Some(&self.kind)
    }

    fn labels(&self) -> Option<&BTreeMap<String, String>> {
        Some(&self.labels)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
