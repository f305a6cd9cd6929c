//! Informer registry.
//!
//! [`InformersMap`] holds at most one [`InformerEntry`] per [`KindKey`] and
//! creates them lazily on first request.
//!
//! ## Locking
//!
//! - The map is a `DashMap` of slots. A slot is reserved under the shard
//!   lock and the guard is dropped before anything slow happens.
//! - Each slot owns a `tokio::sync::OnceCell`. The first caller builds the
//!   informer inside it; concurrent callers for the same kind wait on that
//!   cell, callers for other kinds are not affected.
//! - A failed build leaves the cell empty, so the next caller retries.
//! - Index specs live in the slot behind a mutex. Specs are applied when
//!   the entry is built and again right after it is published, so a spec
//!   registered concurrently with creation is never lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use kinformer_core::{
    CacheError, ConstructionStage, KindKey, Result, RestMapper, StopSignal,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, trace, warn, Span};

use crate::index::IndexSpec;
use crate::informer::{Informer, InformerFactory};
use crate::metrics::CacheMetrics;
use crate::stats::CacheStats;
use crate::store::Store;

/// How often waiters check whether an informer has synced.
pub const DEFAULT_SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One registered informer and its start state.
#[derive(Debug)]
pub struct InformerEntry {
    kind: KindKey,
    informer: Arc<dyn Informer>,
    started: AtomicBool,
}

impl InformerEntry {
    fn new(kind: KindKey, informer: Arc<dyn Informer>) -> Self {
        Self {
            kind,
            informer,
            started: AtomicBool::new(false),
        }
    }

    /// Kind of this entry.
    #[inline]
    pub fn kind(&self) -> &KindKey {
        &self.kind
    }

    /// The informer.
    #[inline]
    pub fn informer(&self) -> &Arc<dyn Informer> {
        &self.informer
    }

    /// The informer's store.
    #[inline]
    pub fn store(&self) -> &Arc<Store> {
        self.informer.store()
    }

    /// Whether the informer has been started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether the informer has completed its initial list.
    pub fn has_synced(&self) -> bool {
        self.informer.has_synced()
    }

    /// Run the informer unless it already runs. Returns whether this call
    /// started it.
    fn start(&self, stop: StopSignal) -> Result<bool> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(false);
        }

        if let Err(err) = self.informer.run(stop) {
            self.started.store(false, Ordering::SeqCst);
            return Err(err);
        }

        debug!(kind = %self.kind, "started informer");
        Ok(true)
    }

    /// Wait until the informer syncs (`true`) or `stop` fires (`false`).
    ///
    /// `poll` bounds how often informers without a sync notification are
    /// checked. Cancelling the wait leaves the informer running.
    pub async fn wait_for_sync(&self, stop: &StopSignal, poll: Duration) -> bool {
        if self.informer.has_synced() {
            return true;
        }
        if stop.is_stopped() {
            return false;
        }
        tokio::select! {
            biased;
            _ = stop.stopped() => self.informer.has_synced(),
            _ = self.informer.synced(poll) => true,
        }
    }
}

/// Reserved registry position for one kind.
#[derive(Debug, Default)]
struct Slot {
    entry: OnceCell<Arc<InformerEntry>>,
    indexes: Mutex<Vec<IndexSpec>>,
}

/// Registry of informers, one per kind.
///
/// # Example
///
/// ```rust,ignore
/// use kinformer_cache::{InformersMap, SharedInformerFactory};
///
/// let map = InformersMap::new(mapper, Arc::new(SharedInformerFactory::new(client)), resync);
/// let (entry, created) = map.get_or_create(&pods).await?;
/// map.start(stop.signal())?;
/// assert!(map.wait_for_cache_sync(stop.signal()).await);
/// ```
#[derive(Debug)]
pub struct InformersMap {
    slots: DashMap<KindKey, Arc<Slot>>,
    mapper: Arc<dyn RestMapper>,
    factory: Arc<dyn InformerFactory>,
    resync: Duration,
    /// Set once by `start`; entries created afterwards start themselves.
    stop: Mutex<Option<StopSignal>>,
    sync_poll: Duration,
    stats: CacheStats,
    metrics: CacheMetrics,
    span: Span,
}

impl InformersMap {
    /// Create an empty registry.
    pub fn new(
        mapper: Arc<dyn RestMapper>,
        factory: Arc<dyn InformerFactory>,
        resync: Duration,
    ) -> Self {
        Self {
            slots: DashMap::new(),
            mapper,
            factory,
            resync,
            stop: Mutex::new(None),
            sync_poll: DEFAULT_SYNC_POLL_INTERVAL,
            stats: CacheStats::new(),
            metrics: CacheMetrics::new(),
            span: Span::none(),
        }
    }

    /// Emit registry events inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Set how often sync waiters poll.
    #[must_use]
    pub fn with_sync_poll_interval(mut self, interval: Duration) -> Self {
        self.sync_poll = interval;
        self
    }

    /// Resync period handed to every informer.
    #[inline]
    pub fn resync_period(&self) -> Duration {
        self.resync
    }

    /// Interval at which sync waiters poll.
    #[inline]
    pub fn sync_poll_interval(&self) -> Duration {
        self.sync_poll
    }

    /// Registry statistics.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Registry metrics.
    #[inline]
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// The entry for `kind`, if one has been built. Never creates.
    pub fn for_kind(&self, kind: &KindKey) -> Option<Arc<InformerEntry>> {
        self.slots
            .get(kind)
            .and_then(|slot| slot.entry.get().cloned())
    }

    /// The entry for `kind`, building it on first use.
    ///
    /// Returns the entry and whether this call built it. Exactly one
    /// informer is ever built per kind; concurrent callers wait for it.
    /// If the registry has been started, a new entry is started before it
    /// is returned.
    pub async fn get_or_create(&self, kind: &KindKey) -> Result<(Arc<InformerEntry>, bool)> {
        if let Some(entry) = self.for_kind(kind) {
            self.stats.record_hit();
            trace!(parent: &self.span, kind = %kind, "informer hit");
            return Ok((entry, false));
        }
        self.stats.record_miss();

        let slot = self.slot(kind);
        let created = AtomicBool::new(false);
        let (created_ref, slot_ref) = (&created, &*slot);

        let entry = slot
            .entry
            .get_or_try_init(move || async move {
                let entry = self.construct(kind, slot_ref).await?;
                created_ref.store(true, Ordering::SeqCst);
                Ok::<_, CacheError>(entry)
            })
            .await?;
        let entry = Arc::clone(entry);
        let created = created.load(Ordering::SeqCst);

        if created {
            // Catch specs registered between construction and publication
            self.apply_indexes(&slot, &entry)?;
        }
        self.start_if_running(&entry)?;

        Ok((entry, created))
    }

    /// Start every informer, now and in future.
    ///
    /// Entries registered later are started by their own creation path.
    /// Returns without waiting for any sync. Fails with
    /// [`CacheError::AlreadyStarted`] on a second call.
    pub fn start(&self, stop: StopSignal) -> Result<()> {
        {
            let mut current = self.stop.lock().expect("registry lock poisoned");
            if current.is_some() {
                return Err(CacheError::AlreadyStarted);
            }
            *current = Some(stop.clone());
        }

        let entries = self.entries();
        info!(parent: &self.span, informers = entries.len(), "starting informers");

        let mut first_err = None;
        for entry in entries {
            if let Err(err) = entry.start(stop.clone()) {
                warn!(parent: &self.span, kind = %entry.kind(), error = %err, "failed to start informer");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Whether [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.stop.lock().expect("registry lock poisoned").is_some()
    }

    /// The stop signal passed to [`start`](Self::start), if started.
    pub fn stop_signal(&self) -> Option<StopSignal> {
        self.stop.lock().expect("registry lock poisoned").clone()
    }

    /// Wait for every registered informer to sync.
    ///
    /// All entries are waited on concurrently. Returns `false` as soon as
    /// `stop` fires with any entry unsynced; it does not say which.
    pub async fn wait_for_cache_sync(&self, stop: StopSignal) -> bool {
        let entries = self.entries();
        debug!(parent: &self.span, informers = entries.len(), "waiting for informers to sync");

        let poll = self.sync_poll;
        let results = join_all(entries.iter().map(|e| e.wait_for_sync(&stop, poll))).await;
        let synced = results.into_iter().all(|synced| synced);

        self.metrics.sync_wait(synced);
        if synced {
            debug!(parent: &self.span, "all informers synced");
        } else {
            warn!(parent: &self.span, "stopped before all informers synced");
        }
        synced
    }

    /// Register a field index for its kind.
    ///
    /// Applied at once if the kind's informer exists, otherwise when it is
    /// built. Registering the same extraction function twice is a no-op; a
    /// different function under the same field fails with
    /// [`CacheError::DuplicateIndex`].
    pub fn add_index(&self, spec: IndexSpec) -> Result<()> {
        let slot = self.slot(spec.kind());
        let mut specs = slot.indexes.lock().expect("slot lock poisoned");

        if let Some(existing) = specs.iter().find(|s| s.field() == spec.field()) {
            if existing.same_extractor(&spec) {
                trace!(parent: &self.span, kind = %spec.kind(), field = spec.field(), "index already registered");
                return Ok(());
            }
            return Err(CacheError::DuplicateIndex {
                kind: spec.kind().clone(),
                field: spec.field().to_string(),
            });
        }

        if let Some(entry) = slot.entry.get() {
            entry
                .informer()
                .add_index(&spec.index_name(), Arc::clone(spec.store_func()))?;
        }

        debug!(parent: &self.span, kind = %spec.kind(), field = spec.field(), "registered field index");
        specs.push(spec);
        self.stats.record_index();
        Ok(())
    }

    /// Fields indexed for `kind`, in registration order.
    pub fn indexed_fields(&self, kind: &KindKey) -> Vec<String> {
        self.slots
            .get(kind)
            .map(|slot| {
                let specs = slot.indexes.lock().expect("slot lock poisoned");
                specs.iter().map(|s| s.field().to_string()).collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of all built entries.
    pub fn entries(&self) -> Vec<Arc<InformerEntry>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.value().entry.get().cloned())
            .collect()
    }

    /// Kinds with a built entry.
    pub fn kinds(&self) -> Vec<KindKey> {
        let mut kinds: Vec<KindKey> = self.entries().iter().map(|e| e.kind().clone()).collect();
        kinds.sort();
        kinds
    }

    /// Number of built entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Check if no entry has been built.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, kind: &KindKey) -> Arc<Slot> {
        // Clone the Arc and drop the shard guard before returning
        let slot = self.slots.entry(kind.clone()).or_default();
        Arc::clone(slot.value())
    }

    async fn construct(&self, kind: &KindKey, slot: &Slot) -> Result<Arc<InformerEntry>> {
        let resource = self
            .mapper
            .resource_for(kind)
            .map_err(|e| self.construction_failed(kind, ConstructionStage::Mapping, e))?;

        debug!(parent: &self.span, kind = %kind, resource = %resource, "creating informer");
        let informer = self
            .factory
            .create(kind, resource, self.resync)
            .await
            .map_err(|e| self.construction_failed(kind, ConstructionStage::Informer, e))?;

        let entry = Arc::new(InformerEntry::new(kind.clone(), informer));
        self.apply_indexes(slot, &entry)
            .map_err(|e| self.construction_failed(kind, ConstructionStage::Informer, e))?;

        self.stats.record_created();
        self.metrics.informer_created(kind);
        info!(parent: &self.span, kind = %kind, "created informer");
        Ok(entry)
    }

    fn construction_failed(&self, kind: &KindKey, stage: ConstructionStage, err: CacheError) -> CacheError {
        self.stats.record_failure();
        self.metrics.construction_failed(kind, stage);
        warn!(parent: &self.span, kind = %kind, stage = %stage, error = %err, "informer construction failed");
        CacheError::construction(kind, stage, err)
    }

    fn apply_indexes(&self, slot: &Slot, entry: &InformerEntry) -> Result<()> {
        let specs = slot.indexes.lock().expect("slot lock poisoned");
        for spec in specs.iter() {
            entry
                .informer()
                .add_index(&spec.index_name(), Arc::clone(spec.store_func()))?;
        }
        Ok(())
    }

    fn start_if_running(&self, entry: &InformerEntry) -> Result<()> {
        let stop = self.stop.lock().expect("registry lock poisoned").clone();
        if let Some(stop) = stop {
            entry.start(stop)?;
        }
        Ok(())
    }
}
