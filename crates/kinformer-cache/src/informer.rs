//! Informers: per-kind watch caches.
//!
//! An [`Informer`] keeps a [`Store`] in step with the cluster. The bundled
//! [`SharedInformer`] does so by:
//!
//! 1. listing every object and replacing the store content,
//! 2. marking itself synced,
//! 3. watching from the list's resource version and applying events,
//! 4. relisting after every resync period, and after a backoff on error.
//!
//! A watch the server closes is reopened from the last seen resource
//! version, after a delay that grows while reopened watches keep closing
//! without delivering events.
//!
//! Informers are built through an [`InformerFactory`], which is the seam
//! the registry uses and tests replace.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use kinformer_core::{
    CacheError, ClusterClient, KindKey, ResourceDescriptor, Result, StopSignal, WatchEvent,
};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn, Instrument, Span};

use crate::metrics::CacheMetrics;
use crate::store::{IndexFunc, IndexerAdded, Store};

/// A watch cache for one kind.
#[async_trait]
pub trait Informer: Send + Sync + fmt::Debug {
    /// Kind this informer caches.
    fn kind(&self) -> &KindKey;

    /// Launch background synchronization until `stop` fires.
    ///
    /// Returns without waiting for the initial list.
    fn run(&self, stop: StopSignal) -> Result<()>;

    /// Whether the initial list has been applied to the store.
    fn has_synced(&self) -> bool;

    /// Resolve once [`has_synced`](Self::has_synced) is true.
    ///
    /// The default checks every `poll`.
    async fn synced(&self, poll: Duration) {
        while !self.has_synced() {
            tokio::time::sleep(poll).await;
        }
    }

    /// The indexed local store.
    fn store(&self) -> &Arc<Store>;

    /// Register an index on the store.
    fn add_index(&self, name: &str, func: IndexFunc) -> Result<IndexerAdded> {
        self.store().add_indexer(name, func)
    }
}

/// Builds informers for the registry.
#[async_trait]
pub trait InformerFactory: Send + Sync + fmt::Debug {
    /// Build an informer for `kind`, served by `resource`.
    ///
    /// The informer must not be running yet.
    async fn create(
        &self,
        kind: &KindKey,
        resource: ResourceDescriptor,
        resync: Duration,
    ) -> Result<Arc<dyn Informer>>;
}

/// Tuning for [`SharedInformer`].
#[derive(Debug, Clone)]
pub struct InformerConfig {
    /// Delay before the first relist after a failure.
    pub initial_backoff: Duration,
    /// Upper bound on the relist delay.
    pub max_backoff: Duration,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(800),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Informer driven by a [`ClusterClient`] list and watch.
#[derive(Debug, Clone)]
pub struct SharedInformer {
    inner: Arc<InformerInner>,
}

#[derive(Debug)]
struct InformerInner {
    kind: KindKey,
    resource: ResourceDescriptor,
    client: Arc<dyn ClusterClient>,
    store: Arc<Store>,
    resync: Duration,
    config: InformerConfig,
    /// Set once the first list has been applied.
    synced: watch::Sender<bool>,
    running: AtomicBool,
    metrics: CacheMetrics,
    span: Span,
}

impl SharedInformer {
    /// Create an informer. Nothing happens until [`Informer::run`].
    pub fn new(
        kind: KindKey,
        resource: ResourceDescriptor,
        client: Arc<dyn ClusterClient>,
        resync: Duration,
    ) -> Self {
        Self::with_config(kind, resource, client, resync, InformerConfig::default())
    }

    /// Create an informer with explicit tuning.
    pub fn with_config(
        kind: KindKey,
        resource: ResourceDescriptor,
        client: Arc<dyn ClusterClient>,
        resync: Duration,
        config: InformerConfig,
    ) -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            inner: Arc::new(InformerInner {
                store: Arc::new(Store::new(kind.clone())),
                kind,
                resource,
                client,
                resync,
                config,
                synced,
                running: AtomicBool::new(false),
                metrics: CacheMetrics::new(),
                span: Span::none(),
            }),
        }
    }

    /// Emit this informer's events inside `span`.
    ///
    /// Only takes effect before the informer is shared.
    #[must_use]
    pub fn instrumented(mut self, span: Span) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.span = span;
        }
        self
    }

    /// The resource this informer lists and watches.
    pub fn resource(&self) -> &ResourceDescriptor {
        &self.inner.resource
    }

    /// The resync period.
    pub fn resync_period(&self) -> Duration {
        self.inner.resync
    }

    /// Whether [`Informer::run`] has been called.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Informer for SharedInformer {
    fn kind(&self) -> &KindKey {
        &self.inner.kind
    }

    fn run(&self, stop: StopSignal) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CacheError::internal("informer requires a tokio runtime", e))?;

        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(parent: &self.inner.span, kind = %self.inner.kind, "informer already running");
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let span = inner.span.clone();
        handle.spawn(inner.reflect(stop).instrument(span));
        Ok(())
    }

    fn has_synced(&self) -> bool {
        *self.inner.synced.borrow()
    }

    async fn synced(&self, _poll: Duration) {
        let mut synced = self.inner.synced.subscribe();
        // The sender lives as long as `self`, so this only returns once synced
        let _ = synced.wait_for(|synced| *synced).await;
    }

    fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }
}

impl InformerInner {
    async fn reflect(self: Arc<Self>, stop: StopSignal) {
        debug!(kind = %self.kind, resource = %self.resource, "informer started");
        let started = Instant::now();
        let mut backoff = self.config.initial_backoff;

        loop {
            let result = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                result = self.list_and_watch(started, &stop) => result,
            };

            match result {
                Ok(()) => backoff = self.config.initial_backoff,
                Err(err) => {
                    warn!(
                        kind = %self.kind,
                        error = %err,
                        retry_in = ?backoff,
                        "list/watch failed"
                    );
                    tokio::select! {
                        biased;
                        _ = stop.stopped() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
            }
        }

        debug!(kind = %self.kind, "informer stopped");
    }

    /// One list followed by watches until the resync deadline or `stop`.
    async fn list_and_watch(&self, started: Instant, stop: &StopSignal) -> Result<()> {
        let list = self.client.list(&self.resource).await?;
        let count = list.items.len();
        self.store.replace(list.items);
        self.mark_synced(started, count);

        let mut resource_version = list.resource_version;
        let mut reopen_delay = self.config.initial_backoff;
        let resync = tokio::time::sleep(self.resync);
        tokio::pin!(resync);

        loop {
            let mut stream = self.client.watch(&self.resource, &resource_version).await?;
            trace!(kind = %self.kind, resource_version = %resource_version, "watch opened");
            let mut delivered = false;

            loop {
                tokio::select! {
                    biased;
                    _ = stop.stopped() => return Ok(()),
                    _ = &mut resync => {
                        debug!(kind = %self.kind, "resync period elapsed, relisting");
                        return Ok(());
                    }
                    next = stream.next() => match next {
                        Some(Ok(event)) => {
                            delivered = true;
                            resource_version = event.resource_version;
                            self.apply(event.event);
                        }
                        Some(Err(err)) => return Err(err),
                        None => break,
                    }
                }
            }

            if delivered {
                reopen_delay = self.config.initial_backoff;
            }
            debug!(kind = %self.kind, reopen_in = ?reopen_delay, "watch closed");
            tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(()),
                _ = &mut resync => {
                    debug!(kind = %self.kind, "resync period elapsed, relisting");
                    return Ok(());
                }
                _ = tokio::time::sleep(reopen_delay) => {}
            }
            if !delivered {
                reopen_delay = (reopen_delay * 2).min(self.config.max_backoff);
            }
        }
    }

    fn mark_synced(&self, started: Instant, count: usize) {
        let first = self.synced.send_if_modified(|synced| !std::mem::replace(synced, true));
        if first {
            self.metrics.informer_synced(&self.kind, started.elapsed());
            info!(kind = %self.kind, objects = count, "informer synced");
        } else {
            debug!(kind = %self.kind, objects = count, "relisted");
        }
    }

    fn apply(&self, event: WatchEvent) {
        trace!(kind = %self.kind, event = event.kind_name(), "watch event");
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => self.store.apply(obj),
            WatchEvent::Deleted(obj) => {
                self.store.delete(&*obj);
            }
            WatchEvent::Bookmark(_) => {}
        }
    }
}

/// Factory building [`SharedInformer`]s over one cluster client.
#[derive(Debug, Clone)]
pub struct SharedInformerFactory {
    client: Arc<dyn ClusterClient>,
    config: InformerConfig,
    span: Span,
}

impl SharedInformerFactory {
    /// Create a factory with default tuning.
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            config: InformerConfig::default(),
            span: Span::none(),
        }
    }

    /// Set informer tuning.
    #[must_use]
    pub fn config(mut self, config: InformerConfig) -> Self {
        self.config = config;
        self
    }

    /// Emit informer events inside `span`.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[async_trait]
impl InformerFactory for SharedInformerFactory {
    async fn create(
        &self,
        kind: &KindKey,
        resource: ResourceDescriptor,
        resync: Duration,
    ) -> Result<Arc<dyn Informer>> {
        let informer = SharedInformer::with_config(
            kind.clone(),
            resource,
            Arc::clone(&self.client),
            resync,
            self.config.clone(),
        )
        .instrumented(self.span.clone());
        Ok(Arc::new(informer))
    }
}
