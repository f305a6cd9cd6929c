//! Prometheus metrics for informer caches.
//!
//! Records through the `metrics` facade; install any recorder to export
//! them.
//!
//! - `kinformer_informers_created_total{kind}`
//! - `kinformer_informer_construction_failures_total{kind, stage}`
//! - `kinformer_informer_sync_seconds{kind}`
//! - `kinformer_active_informers`
//! - `kinformer_cache_sync_waits_total{result}`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kinformer_core::{ConstructionStage, KindKey};
use metrics::{counter, gauge, histogram};

/// Metrics for informer caches.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    inner: Arc<CacheMetricsInner>,
}

#[derive(Debug, Default)]
struct CacheMetricsInner {
    /// Informers created by this registry.
    active_informers: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created informer.
    pub fn informer_created(&self, kind: &KindKey) {
        let count = self.inner.active_informers.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("kinformer_informers_created_total", "kind" => kind.to_string()).increment(1);
        gauge!("kinformer_active_informers").set(count as f64);
    }

    /// Record a failed informer construction.
    pub fn construction_failed(&self, kind: &KindKey, stage: ConstructionStage) {
        counter!(
            "kinformer_informer_construction_failures_total",
            "kind" => kind.to_string(),
            "stage" => stage.to_string()
        )
        .increment(1);
    }

    /// Record the time an informer took to complete its first list.
    pub fn informer_synced(&self, kind: &KindKey, elapsed: Duration) {
        histogram!("kinformer_informer_sync_seconds", "kind" => kind.to_string())
            .record(elapsed.as_secs_f64());
    }

    /// Record the outcome of a wait for cache sync.
    pub fn sync_wait(&self, synced: bool) {
        let result = if synced { "synced" } else { "cancelled" };
        counter!("kinformer_cache_sync_waits_total", "result" => result).increment(1);
    }

    /// Number of informers created through this instance.
    pub fn active_informers(&self) -> u64 {
        self.inner.active_informers.load(Ordering::Relaxed)
    }
}
