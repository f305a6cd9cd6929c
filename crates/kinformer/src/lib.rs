//! # kinformer
//!
//! Read-through object cache for cluster APIs.
//!
//! Instead of sending a request per read, the cache keeps one live,
//! watch-driven informer per kind and serves reads from its local store.
//! Informers are created on first use, shared by every caller, and can be
//! indexed by arbitrary fields.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kinformer::prelude::*;
//!
//! let cache = InformerCache::builder()
//!     .client(client)
//!     .build()
//!     .await?;
//!
//! cache.index_field_for_kind(&pods, "spec.nodeName", dynamic_field("spec.nodeName"))?;
//!
//! let stop = StopHandle::new();
//! cache.start(stop.signal())?;
//! cache.wait_for_cache_sync(stop.signal()).await;
//!
//! let on_node = cache
//!     .list(&pods, &ListOptions::new().matching_field("spec.nodeName", "node-1"))
//!     .await?;
//! ```
//!
//! ## Architecture
//!
//! This library is organized into several crates:
//!
//! - `kinformer-core` - Kinds, objects, scheme, mappers, client trait, errors
//! - `kinformer-cache` - Informers, indexed stores, and the informer registry
//!
//! This crate (`kinformer`) adds the cache facade and re-exports the
//! public APIs of the others.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **No locks held across await points** - Uses DashMap and per-kind cells
//! 3. **One informer per kind** - Concurrent requests share one construction
//! 4. **Observable** - Built-in metrics and tracing support

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod informer_cache;
mod options;
mod reader;

pub use builder::CacheBuilder;
pub use informer_cache::{Cache, CacheState, InformerCache, Informers};
pub use options::{resolve_defaults, Options, ResolvedOptions, DEFAULT_RESYNC_PERIOD};
pub use reader::{ListOptions, Reader};

// Re-export the sub-crates
pub use kinformer_cache as cache;
pub use kinformer_core as core;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use kinformer::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use kinformer_core::{
        downcast, BoxObject, CacheError, ClusterClient, DynamicObject, KindKey, KindResolver,
        Object, ObjectKey, ResourceDescriptor, RestMapper, Result, Scheme, StaticRestMapper,
        StopHandle, StopSignal,
    };

    // Cache types
    pub use kinformer_cache::{
        dynamic_field, CacheStats, IndexFunc, Informer, InformerConfig, MemoryCluster, Store,
    };

    // Facade types
    pub use crate::{
        Cache, CacheBuilder, CacheState, InformerCache, Informers, ListOptions, Options, Reader,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("kinformer {} (MSRV {})", VERSION, MSRV)
    }
}
