//! Thread-safe indexed object store.
//!
//! Each informer keeps its objects in a [`Store`]. Objects are keyed by
//! `namespace/name` and can be looked up through any number of named
//! indexes. Every store carries a [`NAMESPACE_INDEX`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use kinformer_core::{object_key, BoxObject, CacheError, KindKey, Object, ObjectKey, Result};
use tracing::trace;

/// Computes the index values of an object.
///
/// Must be pure. Returning several values makes the object reachable
/// through each of them.
pub type IndexFunc = Arc<dyn Fn(&dyn Object) -> Vec<String> + Send + Sync>;

/// Name of the built-in index over object namespaces.
pub const NAMESPACE_INDEX: &str = "namespace";

/// Outcome of registering an indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerAdded {
    /// The indexer is new and existing objects were indexed.
    Added,
    /// The same indexer was already registered.
    Unchanged,
}

/// Index values of one index: value -> object keys.
type Index = HashMap<String, HashSet<String>>;

#[derive(Default)]
struct StoreInner {
    items: HashMap<String, BoxObject>,
    indexers: HashMap<String, IndexFunc>,
    indices: HashMap<String, Index>,
}

impl StoreInner {
    fn index_object(&mut self, key: &str, obj: &dyn Object) {
        for (name, func) in &self.indexers {
            let index = self.indices.entry(name.clone()).or_default();
            for value in func(obj) {
                index.entry(value).or_default().insert(key.to_string());
            }
        }
    }

    fn unindex_object(&mut self, key: &str, obj: &dyn Object) {
        for (name, func) in &self.indexers {
            let Some(index) = self.indices.get_mut(name) else {
                continue;
            };
            for value in func(obj) {
                if let Some(keys) = index.get_mut(&value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&value);
                    }
                }
            }
        }
    }

    fn upsert(&mut self, key: String, obj: BoxObject) {
        if let Some(old) = self.items.remove(&key) {
            self.unindex_object(&key, &*old);
        }
        self.index_object(&key, &*obj);
        self.items.insert(key, obj);
    }
}

/// A thread-safe object store with secondary indexes.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kinformer_cache::{Store, NAMESPACE_INDEX};
/// use kinformer_core::{DynamicObject, KindKey};
///
/// let kind = KindKey::new("", "v1", "Pod");
/// let store = Store::new(kind.clone());
/// store.apply(Arc::new(DynamicObject::new(kind, "web-0").within("default")));
///
/// let pods = store.by_index(NAMESPACE_INDEX, "default").unwrap();
/// assert_eq!(pods.len(), 1);
/// ```
pub struct Store {
    kind: KindKey,
    inner: RwLock<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .field("indexers", &self.indexer_names())
            .finish()
    }
}

impl Store {
    /// Create an empty store for `kind` with the namespace index.
    pub fn new(kind: KindKey) -> Self {
        let mut inner = StoreInner::default();
        let namespace: IndexFunc =
            Arc::new(|obj: &dyn Object| vec![obj.namespace().unwrap_or_default().to_string()]);
        inner.indexers.insert(NAMESPACE_INDEX.to_string(), namespace);
        Self {
            kind,
            inner: RwLock::new(inner),
        }
    }

    /// Kind of the objects in this store.
    #[inline]
    pub fn kind(&self) -> &KindKey {
        &self.kind
    }

    /// Register an indexer and index the objects already present.
    ///
    /// Registering the same `Arc` again is a no-op. A different function
    /// under an existing name fails with [`CacheError::DuplicateIndex`].
    pub fn add_indexer(&self, name: &str, func: IndexFunc) -> Result<IndexerAdded> {
        let mut inner = self.inner.write().expect("store lock poisoned");

        if let Some(existing) = inner.indexers.get(name) {
            if Arc::ptr_eq(existing, &func) {
                return Ok(IndexerAdded::Unchanged);
            }
            return Err(CacheError::DuplicateIndex {
                kind: self.kind.clone(),
                field: name.to_string(),
            });
        }

        let mut index = Index::new();
        for (key, obj) in &inner.items {
            for value in func(&**obj) {
                index.entry(value).or_default().insert(key.clone());
            }
        }
        inner.indices.insert(name.to_string(), index);
        inner.indexers.insert(name.to_string(), func);

        trace!(kind = %self.kind, index = name, "added indexer");
        Ok(IndexerAdded::Added)
    }

    /// Check if an indexer is registered under `name`.
    pub fn has_indexer(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.indexers.contains_key(name)
    }

    /// Names of all registered indexers.
    pub fn indexer_names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut names: Vec<String> = inner.indexers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert or replace an object.
    pub fn apply(&self, obj: BoxObject) {
        let key = object_key(&*obj);
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.upsert(key, obj);
    }

    /// Remove an object. Returns the removed object, if it was present.
    pub fn delete(&self, obj: &dyn Object) -> Option<BoxObject> {
        self.delete_key(&object_key(obj))
    }

    /// Remove the object stored under `key`.
    pub fn delete_key(&self, key: &str) -> Option<BoxObject> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let old = inner.items.remove(key)?;
        inner.unindex_object(key, &*old);
        Some(old)
    }

    /// Replace the whole content of the store, rebuilding every index.
    pub fn replace(&self, items: Vec<BoxObject>) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.items.clear();
        inner.indices.clear();
        for obj in items {
            let key = object_key(&*obj);
            inner.upsert(key, obj);
        }
    }

    /// Get an object by its store key.
    pub fn get_by_key(&self, key: &str) -> Option<BoxObject> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.items.get(key).cloned()
    }

    /// Get an object by namespace and name.
    pub fn get(&self, key: &ObjectKey) -> Option<BoxObject> {
        self.get_by_key(&key.to_string())
    }

    /// All objects, in no particular order.
    pub fn list(&self) -> Vec<BoxObject> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.items.values().cloned().collect()
    }

    /// All store keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut keys: Vec<String> = inner.items.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get the number of stored objects.
    pub fn len(&self) -> usize {
        self.inner.read().expect("store lock poisoned").items.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Objects whose `index` values include `value`.
    pub fn by_index(&self, index: &str, value: &str) -> Result<Vec<BoxObject>> {
        let inner = self.inner.read().expect("store lock poisoned");
        if !inner.indexers.contains_key(index) {
            return Err(CacheError::UnknownIndex {
                kind: self.kind.clone(),
                index: index.to_string(),
            });
        }

        let objects: Vec<BoxObject> = inner
            .indices
            .get(index)
            .and_then(|idx| idx.get(value))
            .map(|keys| keys.iter().filter_map(|k| inner.items.get(k).cloned()).collect())
            .unwrap_or_default();
        Ok(objects)
    }

    /// Store keys whose `index` values include `value`, sorted.
    pub fn index_keys(&self, index: &str, value: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().expect("store lock poisoned");
        if !inner.indexers.contains_key(index) {
            return Err(CacheError::UnknownIndex {
                kind: self.kind.clone(),
                index: index.to_string(),
            });
        }

        let mut keys: Vec<String> = inner
            .indices
            .get(index)
            .and_then(|idx| idx.get(value))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    /// Every value currently present in `index`, sorted.
    pub fn index_values(&self, index: &str) -> Vec<String> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut values: Vec<String> = inner
            .indices
            .get(index)
            .map(|idx| idx.keys().cloned().collect())
            .unwrap_or_default();
        values.sort();
        values
    }
}
