//! The informer-backed cache.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kinformer_cache::{
    field_index_name, field_index_value, CacheStats, IndexFunc, IndexSpec, Informer,
    InformerEntry, InformerFactory, InformersMap, SharedInformerFactory, NAMESPACE_INDEX,
};
use kinformer_core::{
    object_key, BoxObject, CacheError, ClusterClient, KindKey, Object, ObjectKey, Result,
    StopSignal,
};
use tracing::{debug, info, Span};

use crate::builder::CacheBuilder;
use crate::options::{resolve_defaults, Options, ResolvedOptions};
use crate::reader::{ListOptions, Reader};

/// Access to the informers behind a cache.
#[async_trait]
pub trait Informers: Send + Sync {
    /// The informer for the kind of `obj`, created on first use.
    async fn get_informer(&self, obj: &dyn Object) -> Result<Arc<dyn Informer>>;

    /// The informer for `kind`, created on first use.
    async fn get_informer_for_kind(&self, kind: &KindKey) -> Result<Arc<dyn Informer>>;

    /// Run every informer until `stop` fires. Does not wait for sync.
    fn start(&self, stop: StopSignal) -> Result<()>;

    /// Wait until every informer has synced. `false` if `stop` fired first.
    async fn wait_for_cache_sync(&self, stop: StopSignal) -> bool;

    /// Index the kind of `obj` by `field`, using `extract` to read it.
    fn index_field(&self, obj: &dyn Object, field: &str, extract: IndexFunc) -> Result<()>;
}

/// A [`Reader`] that also manages its [`Informers`].
pub trait Cache: Reader + Informers {}

impl<T: Reader + Informers + ?Sized> Cache for T {}

/// Lifecycle of an [`InformerCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Created, `start` not called.
    Unstarted,
    /// `start` in progress.
    Starting,
    /// Informers are running.
    Running,
    /// The stop signal fired.
    Stopped,
}

/// Read-through cache keeping one informer per kind.
///
/// Cheap to clone; clones share the same informers.
///
/// # Example
///
/// ```rust,ignore
/// use kinformer::prelude::*;
///
/// let cache = InformerCache::new(client, Options::new()).await?;
/// let stop = StopHandle::new();
/// cache.start(stop.signal())?;
///
/// let pods = cache.list(&pod_kind, &ListOptions::new().in_namespace("default")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InformerCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    informers: Arc<InformersMap>,
    options: ResolvedOptions,
    state: Mutex<CacheState>,
    span: Span,
}

impl InformerCache {
    /// Build a cache over `client`, filling unset options with defaults.
    ///
    /// Fails with [`CacheError::MapperDiscovery`] if no mapper is given and
    /// discovery fails.
    pub async fn new(client: Arc<dyn ClusterClient>, options: Options) -> Result<Self> {
        let resolved = resolve_defaults(client.as_ref(), options).await?;
        let factory = Arc::new(SharedInformerFactory::new(client));
        Ok(Self::from_parts(resolved, factory, Span::none(), None))
    }

    /// Create a builder.
    pub fn builder() -> CacheBuilder {
        CacheBuilder::new()
    }

    pub(crate) fn from_parts(
        options: ResolvedOptions,
        factory: Arc<dyn InformerFactory>,
        span: Span,
        sync_poll: Option<std::time::Duration>,
    ) -> Self {
        let mut informers = InformersMap::new(Arc::clone(options.mapper()), factory, options.resync())
            .with_span(span.clone());
        if let Some(interval) = sync_poll {
            informers = informers.with_sync_poll_interval(interval);
        }
        debug!(parent: &span, resync = ?options.resync(), "created informer cache");

        Self {
            inner: Arc::new(CacheInner {
                informers: Arc::new(informers),
                options,
                state: Mutex::new(CacheState::Unstarted),
                span,
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CacheState {
        let state = *self.inner.state.lock().expect("state lock poisoned");
        let stopped = self
            .inner
            .informers
            .stop_signal()
            .is_some_and(|stop| stop.is_stopped());
        if stopped {
            CacheState::Stopped
        } else {
            state
        }
    }

    /// The resolved options.
    pub fn options(&self) -> &ResolvedOptions {
        &self.inner.options
    }

    /// The informer registry.
    pub fn informers(&self) -> &Arc<InformersMap> {
        &self.inner.informers
    }

    /// Registry statistics.
    pub fn stats(&self) -> &CacheStats {
        self.inner.informers.stats()
    }

    /// Kinds with an informer.
    pub fn kinds(&self) -> Vec<KindKey> {
        self.inner.informers.kinds()
    }

    /// Index `kind` by `field`. See [`Informers::index_field`].
    pub fn index_field_for_kind(&self, kind: &KindKey, field: &str, extract: IndexFunc) -> Result<()> {
        self.inner
            .informers
            .add_index(IndexSpec::new(kind.clone(), field, extract))
    }

    /// A started, synced entry for `kind`, created on first use.
    async fn synced_entry(&self, kind: &KindKey) -> Result<Arc<InformerEntry>> {
        let stop = self.inner.informers.stop_signal().ok_or(CacheError::NotStarted)?;
        let (entry, _) = self.inner.informers.get_or_create(kind).await?;

        let poll = self.inner.informers.sync_poll_interval();
        if !entry.wait_for_sync(&stop, poll).await {
            return Err(CacheError::Stopped);
        }
        Ok(entry)
    }
}

#[async_trait]
impl Informers for InformerCache {
    async fn get_informer(&self, obj: &dyn Object) -> Result<Arc<dyn Informer>> {
        let kind = self.inner.options.scheme().resolve(obj)?;
        self.get_informer_for_kind(&kind).await
    }

    async fn get_informer_for_kind(&self, kind: &KindKey) -> Result<Arc<dyn Informer>> {
        let (entry, _) = self.inner.informers.get_or_create(kind).await?;
        Ok(Arc::clone(entry.informer()))
    }

    fn start(&self, stop: StopSignal) -> Result<()> {
        {
            let mut state = self.inner.state.lock().expect("state lock poisoned");
            if *state != CacheState::Unstarted {
                return Err(CacheError::AlreadyStarted);
            }
            *state = CacheState::Starting;
        }

        info!(parent: &self.inner.span, "starting informer cache");
        let result = self.inner.informers.start(stop);
        *self.inner.state.lock().expect("state lock poisoned") = CacheState::Running;
        result
    }

    async fn wait_for_cache_sync(&self, stop: StopSignal) -> bool {
        self.inner.informers.wait_for_cache_sync(stop).await
    }

    fn index_field(&self, obj: &dyn Object, field: &str, extract: IndexFunc) -> Result<()> {
        let kind = self.inner.options.scheme().resolve(obj)?;
        self.index_field_for_kind(&kind, field, extract)
    }
}

#[async_trait]
impl Reader for InformerCache {
    async fn get(&self, kind: &KindKey, key: &ObjectKey) -> Result<BoxObject> {
        let entry = self.synced_entry(kind).await?;
        entry.store().get(key).ok_or_else(|| CacheError::NotFound {
            kind: kind.clone(),
            key: key.to_string(),
        })
    }

    async fn list(&self, kind: &KindKey, options: &ListOptions) -> Result<Vec<BoxObject>> {
        let entry = self.synced_entry(kind).await?;
        let store = entry.store();

        let candidates = match (options.field(), options.namespace()) {
            (Some((field, value)), namespace) => {
                store.by_index(&field_index_name(field), &field_index_value(namespace, value))?
            }
            (None, Some(namespace)) => store.by_index(NAMESPACE_INDEX, namespace)?,
            (None, None) => store.list(),
        };

        let mut objects: Vec<BoxObject> = candidates
            .into_iter()
            .filter(|obj| options.matches_labels(obj.as_ref()))
            .collect();
        objects.sort_by_cached_key(|obj| object_key(obj.as_ref()));
        Ok(objects)
    }
}
