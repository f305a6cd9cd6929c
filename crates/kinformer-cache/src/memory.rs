//! In-process cluster for tests and demos.
//!
//! [`MemoryCluster`] implements [`ClusterClient`] over in-memory
//! collections. It hands out monotonically increasing resource versions and
//! keeps a bounded event log per collection, so a watch opened at the
//! version of a list sees every later change without gaps.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use kinformer_core::{
    object_key, ApiResource, BoxObject, CacheError, ClusterClient, KindKey, Object, ObjectKey,
    ObjectList, ResourceDescriptor, Result, VersionedEvent, WatchEvent, WatchStream,
};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

/// Events retained per collection for watch replay.
const EVENT_LOG_CAPACITY: usize = 1024;

/// Buffer of the live event channel per collection.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct Collection {
    state: Mutex<CollectionState>,
    events: broadcast::Sender<VersionedEvent>,
}

#[derive(Debug, Default)]
struct CollectionState {
    objects: BTreeMap<String, BoxObject>,
    log: VecDeque<(u64, VersionedEvent)>,
}

impl Collection {
    fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(CollectionState::default()),
            events,
        }
    }
}

/// An in-memory [`ClusterClient`].
///
/// # Example
///
/// ```rust
/// use kinformer_cache::MemoryCluster;
/// use kinformer_core::{DynamicObject, KindKey, ResourceDescriptor};
///
/// let cluster = MemoryCluster::new();
/// let pods = KindKey::new("", "v1", "Pod");
/// cluster.register(pods.clone(), ResourceDescriptor::namespaced("", "v1", "pods"));
///
/// cluster.apply(&pods, DynamicObject::new(pods.clone(), "web-0").within("default")).unwrap();
/// assert_eq!(cluster.object_count(&pods), 1);
/// ```
#[derive(Debug)]
pub struct MemoryCluster {
    kinds: DashMap<KindKey, ResourceDescriptor>,
    collections: DashMap<ResourceDescriptor, Arc<Collection>>,
    revision: AtomicU64,
    fail_discovery: AtomicBool,
    lists_paused: watch::Sender<bool>,
    list_calls: AtomicU64,
    watch_calls: AtomicU64,
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCluster {
    /// Create an empty cluster serving no resources.
    pub fn new() -> Self {
        let (lists_paused, _) = watch::channel(false);
        Self {
            kinds: DashMap::new(),
            collections: DashMap::new(),
            revision: AtomicU64::new(0),
            fail_discovery: AtomicBool::new(false),
            lists_paused,
            list_calls: AtomicU64::new(0),
            watch_calls: AtomicU64::new(0),
        }
    }

    /// Serve `kind` through `resource`.
    pub fn register(&self, kind: KindKey, resource: ResourceDescriptor) {
        self.collections
            .entry(resource.clone())
            .or_insert_with(|| Arc::new(Collection::new()));
        debug!(kind = %kind, resource = %resource, "registered resource");
        self.kinds.insert(kind, resource);
    }

    /// Make discovery fail (or succeed again).
    pub fn set_discovery_failure(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    /// Hold every list call until [`resume_lists`](Self::resume_lists).
    pub fn pause_lists(&self) {
        self.lists_paused.send_replace(true);
    }

    /// Release held list calls.
    pub fn resume_lists(&self) {
        self.lists_paused.send_replace(false);
    }

    /// Number of list calls served.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of watches opened.
    pub fn watch_calls(&self) -> u64 {
        self.watch_calls.load(Ordering::SeqCst)
    }

    /// Number of objects stored for `kind`.
    pub fn object_count(&self, kind: &KindKey) -> usize {
        self.collection_for_kind(kind)
            .map(|c| c.state.lock().expect("collection lock poisoned").objects.len())
            .unwrap_or(0)
    }

    /// Create or update an object. Returns its new resource version.
    pub fn apply(&self, kind: &KindKey, obj: impl Object + 'static) -> Result<String> {
        self.apply_boxed(kind, Arc::new(obj))
    }

    /// Create or update a shared object. Returns its new resource version.
    pub fn apply_boxed(&self, kind: &KindKey, obj: BoxObject) -> Result<String> {
        let collection = self.collection_for_kind(kind)?;
        let key = object_key(&*obj);

        let mut state = collection.state.lock().expect("collection lock poisoned");
        let event = match state.objects.insert(key, Arc::clone(&obj)) {
            Some(_) => WatchEvent::Modified(obj),
            None => WatchEvent::Added(obj),
        };
        Ok(self.record(&collection, &mut state, event))
    }

    /// Delete an object. Returns the removed object, if it existed.
    pub fn delete(&self, kind: &KindKey, key: &ObjectKey) -> Option<BoxObject> {
        let collection = self.collection_for_kind(kind).ok()?;
        let mut state = collection.state.lock().expect("collection lock poisoned");
        let removed = state.objects.remove(&key.to_string())?;
        self.record(&collection, &mut state, WatchEvent::Deleted(Arc::clone(&removed)));
        Some(removed)
    }

    /// Log and broadcast an event. Called with the collection lock held.
    fn record(&self, collection: &Collection, state: &mut CollectionState, event: WatchEvent) -> String {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let versioned = VersionedEvent {
            resource_version: revision.to_string(),
            event,
        };

        if state.log.len() == EVENT_LOG_CAPACITY {
            state.log.pop_front();
        }
        state.log.push_back((revision, versioned.clone()));

        // No receivers is fine
        let _ = collection.events.send(versioned);
        trace!(revision, "recorded event");
        revision.to_string()
    }

    fn collection_for_kind(&self, kind: &KindKey) -> Result<Arc<Collection>> {
        let resource = self
            .kinds
            .get(kind)
            .map(|r| r.value().clone())
            .ok_or_else(|| CacheError::NoResourceMapping { kind: kind.clone() })?;
        self.collection(&resource)
    }

    fn collection(&self, resource: &ResourceDescriptor) -> Result<Arc<Collection>> {
        self.collections
            .get(resource)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| CacheError::Client {
                message: format!("the server could not find the requested resource {resource}"),
                source: None,
            })
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn server_resources(&self) -> Result<Vec<ApiResource>> {
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(CacheError::Client {
                message: "discovery failed: server unavailable".to_string(),
                source: None,
            });
        }

        Ok(self
            .kinds
            .iter()
            .map(|e| ApiResource::new(e.key().clone(), e.value().clone()))
            .collect())
    }

    async fn list(&self, resource: &ResourceDescriptor) -> Result<ObjectList> {
        let mut paused = self.lists_paused.subscribe();
        paused
            .wait_for(|paused| !*paused)
            .await
            .map_err(|e| CacheError::internal("list gate closed", e))?;

        let collection = self.collection(resource)?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let state = collection.state.lock().expect("collection lock poisoned");
        Ok(ObjectList {
            resource_version: self.revision.load(Ordering::SeqCst).to_string(),
            items: state.objects.values().cloned().collect(),
        })
    }

    async fn watch(&self, resource: &ResourceDescriptor, resource_version: &str) -> Result<WatchStream> {
        let since: u64 = resource_version.parse().map_err(|_| CacheError::Client {
            message: format!("invalid resource version {resource_version:?}"),
            source: None,
        })?;
        let collection = self.collection(resource)?;
        self.watch_calls.fetch_add(1, Ordering::SeqCst);

        let (replay, live) = {
            let state = collection.state.lock().expect("collection lock poisoned");
            if let Some((oldest, _)) = state.log.front() {
                if *oldest > since + 1 && state.log.len() == EVENT_LOG_CAPACITY {
                    return Err(CacheError::Client {
                        message: format!("resource version {since} is too old"),
                        source: None,
                    });
                }
            }
            let replay: Vec<Result<VersionedEvent>> = state
                .log
                .iter()
                .filter(|(rev, _)| *rev > since)
                .map(|(_, e)| Ok(e.clone()))
                .collect();
            (replay, collection.events.subscribe())
        };

        let live = BroadcastStream::new(live).map(|item| {
            item.map_err(|e| CacheError::client("watch fell behind", e))
        });
        Ok(futures::stream::iter(replay).chain(live).boxed())
    }
}
