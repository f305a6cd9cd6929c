//! Field indexes.
//!
//! A field index is registered by field name and stored in the informer's
//! store under [`field_index_name`]. Every extracted value is indexed twice:
//! once cluster-wide and once under the object's namespace, so reads can
//! be scoped either way.

use std::fmt;
use std::sync::Arc;

use kinformer_core::{DynamicObject, KindKey, Object};
use serde_json::Value;

use crate::store::IndexFunc;

/// Prefix of store indexes that back field indexes.
pub const FIELD_INDEX_PREFIX: &str = "field:";

/// Namespace component used for cluster-wide field index values.
pub const ALL_NAMESPACES: &str = "__all_namespaces";

/// Store index name backing the field index `field`.
#[must_use]
pub fn field_index_name(field: &str) -> String {
    format!("{FIELD_INDEX_PREFIX}{field}")
}

/// Index value for `value` scoped to `namespace` (or cluster-wide).
#[must_use]
pub fn field_index_value(namespace: Option<&str>, value: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{value}"),
        _ => format!("{ALL_NAMESPACES}/{value}"),
    }
}

/// Extractor reading a dotted path out of a [`DynamicObject`] body.
///
/// Strings, numbers and booleans yield one value; arrays yield one value
/// per scalar element. Other object types yield nothing.
///
/// ```rust
/// use kinformer_cache::dynamic_field;
/// use kinformer_core::{DynamicObject, KindKey};
/// use serde_json::json;
///
/// let pod = DynamicObject::new(KindKey::new("", "v1", "Pod"), "web")
///     .data(json!({"spec": {"nodeName": "node-1"}}));
/// assert_eq!(dynamic_field("spec.nodeName")(&pod), vec!["node-1"]);
/// ```
pub fn dynamic_field(path: impl Into<String>) -> IndexFunc {
    let path = path.into();
    Arc::new(move |obj: &dyn Object| {
        let Some(value) = obj
            .as_any()
            .downcast_ref::<DynamicObject>()
            .and_then(|o| o.field(&path))
        else {
            return Vec::new();
        };
        match value {
            Value::Array(items) => items.iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        }
    })
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A field index registered for a kind.
#[derive(Clone)]
pub struct IndexSpec {
    kind: KindKey,
    field: String,
    extract: IndexFunc,
    store_func: IndexFunc,
}

impl fmt::Debug for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSpec")
            .field("kind", &self.kind)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl IndexSpec {
    /// Create a spec. `extract` returns the field values of an object.
    pub fn new(kind: KindKey, field: impl Into<String>, extract: IndexFunc) -> Self {
        let store_func = scoped(Arc::clone(&extract));
        Self {
            kind,
            field: field.into(),
            extract,
            store_func,
        }
    }

    /// Kind the index applies to.
    #[inline]
    pub fn kind(&self) -> &KindKey {
        &self.kind
    }

    /// Field name.
    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Store index name for this field.
    pub fn index_name(&self) -> String {
        field_index_name(&self.field)
    }

    /// The user-supplied extraction function.
    #[inline]
    pub fn extract(&self) -> &IndexFunc {
        &self.extract
    }

    /// The namespace-scoping function installed in the store.
    ///
    /// Cloning a spec keeps this `Arc`, so applying one spec to a store
    /// twice is a no-op.
    #[inline]
    pub fn store_func(&self) -> &IndexFunc {
        &self.store_func
    }

    /// Whether `other` registers the same extraction function.
    pub fn same_extractor(&self, other: &IndexSpec) -> bool {
        Arc::ptr_eq(&self.extract, &other.extract)
    }
}

fn scoped(extract: IndexFunc) -> IndexFunc {
    Arc::new(move |obj: &dyn Object| {
        let values = extract(obj);
        let namespace = obj.namespace().filter(|ns| !ns.is_empty());
        let mut out = Vec::with_capacity(values.len() * 2);
        for value in values {
            out.push(field_index_value(None, &value));
            if namespace.is_some() {
                out.push(field_index_value(namespace, &value));
            }
        }
        out
    })
}
