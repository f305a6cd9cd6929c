//! # kinformer-cache
//!
//! Per-kind informers and the registry that shares them.
//!
//! This crate provides the caching layer beneath the kinformer read API:
//!
//! - [`InformersMap`] - Registry holding at most one informer per kind
//! - [`SharedInformer`] - List-and-watch informer feeding a [`Store`]
//! - [`Store`] - Indexed, thread-safe object store
//! - [`IndexSpec`] - Field index registered for a kind
//! - [`MemoryCluster`] - In-process cluster for tests and demos
//!
//! ## Key Design Decisions
//!
//! - Uses `DashMap` for the registry; all `DashMap` references are dropped
//!   before any `.await`
//! - Each kind is built once inside its own `OnceCell`, so slow
//!   construction of one kind never blocks lookups of another
//! - A failed construction leaves nothing behind and is retried on the
//!   next request
//!
//! ## Example
//!
//! ```rust,ignore
//! use kinformer_cache::{InformersMap, MemoryCluster, SharedInformerFactory};
//! use kinformer_core::{StaticRestMapper, StopHandle};
//!
//! let cluster = Arc::new(MemoryCluster::new());
//! let factory = Arc::new(SharedInformerFactory::new(cluster.clone()));
//! let map = InformersMap::new(Arc::new(mapper), factory, Duration::from_secs(600));
//!
//! let (entry, _) = map.get_or_create(&pods).await?;
//! let stop = StopHandle::new();
//! map.start(stop.signal())?;
//! map.wait_for_cache_sync(stop.signal()).await;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod index;
mod informer;
mod memory;
mod metrics;
mod registry;
mod stats;
mod store;

pub use index::{dynamic_field, field_index_name, field_index_value, IndexSpec, ALL_NAMESPACES, FIELD_INDEX_PREFIX};
pub use informer::{Informer, InformerConfig, InformerFactory, SharedInformer, SharedInformerFactory};
pub use memory::MemoryCluster;
pub use metrics::CacheMetrics;
pub use registry::{InformerEntry, InformersMap, DEFAULT_SYNC_POLL_INTERVAL};
pub use stats::CacheStats;
pub use store::{IndexFunc, IndexerAdded, Store, NAMESPACE_INDEX};
