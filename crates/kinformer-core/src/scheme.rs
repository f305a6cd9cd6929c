//! Kind resolution for typed objects.
//!
//! This module provides the [`KindResolver`] trait and [`Scheme`], a
//! thread-safe registry mapping Rust types to [`KindKey`]s.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::{CacheError, DynamicObject, KindKey, Object, Result};

/// Resolves the kind of an object.
pub trait KindResolver: Send + Sync + fmt::Debug {
    /// Return the canonical kind for `obj`.
    fn resolve(&self, obj: &dyn Object) -> Result<KindKey>;
}

#[derive(Debug, Clone)]
struct TypeEntry {
    kind: KindKey,
    type_name: &'static str,
}

/// Thread-safe registry of Rust types and the kinds they represent.
///
/// Objects whose type is registered resolve to the registered kind. Other
/// objects resolve to the kind they carry themselves (see
/// [`Object::kind`]), which is how [`DynamicObject`] works out of the box.
///
/// # Example
///
/// ```rust
/// use kinformer_core::{KindKey, KindResolver, Object, Scheme};
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
///
/// let scheme = Scheme::new();
/// scheme.register::<Node>(KindKey::new("", "v1", "Node"));
///
/// let node = Node { name: "node-1".to_string() };
/// assert_eq!(scheme.resolve(&node).unwrap().kind(), "Node");
/// ```
#[derive(Debug, Default)]
pub struct Scheme {
    types: DashMap<TypeId, TypeEntry>,
}

impl Scheme {
    /// Create a new empty scheme.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide built-in scheme.
    ///
    /// It starts empty, so it resolves only self-describing objects until
    /// types are registered on it.
    pub fn global() -> Arc<Scheme> {
        static GLOBAL: OnceLock<Arc<Scheme>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Scheme::new())))
    }

    /// Register `T` as the Rust type for `kind`.
    ///
    /// Registering the same type again replaces its kind.
    pub fn register<T: Object + 'static>(&self, kind: KindKey) {
        self.types.insert(
            TypeId::of::<T>(),
            TypeEntry {
                kind,
                type_name: type_name::<T>(),
            },
        );
    }

    /// Kind registered for `T`, if any.
    #[must_use]
    pub fn kind_for<T: Object + 'static>(&self) -> Option<KindKey> {
        self.types.get(&TypeId::of::<T>()).map(|e| e.kind.clone())
    }

    /// Check if `T` is registered.
    #[must_use]
    pub fn is_registered<T: Object + 'static>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    /// All registered kinds.
    #[must_use]
    pub fn kinds(&self) -> Vec<KindKey> {
        self.types.iter().map(|e| e.kind.clone()).collect()
    }

    /// Get the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the scheme is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl KindResolver for Scheme {
    fn resolve(&self, obj: &dyn Object) -> Result<KindKey> {
        let any: &dyn Any = obj.as_any();
        if let Some(entry) = self.types.get(&any.type_id()) {
            return Ok(entry.kind.clone());
        }

        if let Some(kind) = obj.kind() {
            if kind.kind().is_empty() || kind.version().is_empty() {
                return Err(CacheError::Resolution {
                    type_name: describe(obj),
                    reason: format!("object carries an incomplete kind ({kind})"),
                });
            }
            return Ok(kind.clone());
        }

        Err(CacheError::Resolution {
            type_name: describe(obj),
            reason: "type is not registered in the scheme".to_string(),
        })
    }
}

fn describe(obj: &dyn Object) -> String {
    if obj.as_any().is::<DynamicObject>() {
        type_name::<DynamicObject>().to_string()
    } else {
        format!("object {:?}", obj.name())
    }
}
