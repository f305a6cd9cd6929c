//! Registry statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for registry operations.
///
/// All counters are atomic and can be safely accessed from multiple threads.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered by an existing informer.
    informer_hits: AtomicU64,
    /// Lookups that had to construct (or wait for) an informer.
    informer_misses: AtomicU64,
    /// Informers successfully constructed.
    informers_created: AtomicU64,
    /// Informer constructions that failed.
    construction_failures: AtomicU64,
    /// Field indexes registered.
    indexes_registered: AtomicU64,
}

impl CacheStats {
    /// Create new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup served by an existing informer.
    #[inline]
    pub fn record_hit(&self) {
        self.informer_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that found no ready informer.
    #[inline]
    pub fn record_miss(&self) {
        self.informer_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a constructed informer.
    #[inline]
    pub fn record_created(&self) {
        self.informers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed construction.
    #[inline]
    pub fn record_failure(&self) {
        self.construction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a registered field index.
    #[inline]
    pub fn record_index(&self) {
        self.indexes_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits.
    #[inline]
    pub fn informer_hits(&self) -> u64 {
        self.informer_hits.load(Ordering::Relaxed)
    }

    /// Get total misses.
    #[inline]
    pub fn informer_misses(&self) -> u64 {
        self.informer_misses.load(Ordering::Relaxed)
    }

    /// Get total informers created.
    #[inline]
    pub fn informers_created(&self) -> u64 {
        self.informers_created.load(Ordering::Relaxed)
    }

    /// Get total construction failures.
    #[inline]
    pub fn construction_failures(&self) -> u64 {
        self.construction_failures.load(Ordering::Relaxed)
    }

    /// Get total registered field indexes.
    #[inline]
    pub fn indexes_registered(&self) -> u64 {
        self.indexes_registered.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.informer_hits() as f64;
        let total = hits + self.informer_misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}
