//! # kinformer-core
//!
//! Core types, traits, and error handling for the kinformer object cache.
//!
//! This crate provides the foundational types used across all other kinformer crates:
//!
//! - [`CacheError`] - Error type shared by every crate
//! - [`KindKey`] / [`ResourceDescriptor`] - Kind and resource identifiers
//! - [`Object`] / [`DynamicObject`] - What caches hold
//! - [`Scheme`] - Resolves Rust types to kinds
//! - [`RestMapper`] - Maps kinds to API resources
//! - [`ClusterClient`] - Transport seam to the cluster API
//! - [`StopHandle`] / [`StopSignal`] - Cancellation
//!
//! ## Example
//!
//! ```rust
//! use kinformer_core::{DynamicObject, KindKey, KindResolver, Scheme};
//!
//! let kind = KindKey::new("apps", "v1", "Deployment");
//! let obj = DynamicObject::new(kind.clone(), "web").within("default");
//!
//! let scheme = Scheme::new();
//! assert_eq!(scheme.resolve(&obj).unwrap(), kind);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod kind;
mod mapper;
mod object;
mod scheme;
mod stop;

pub use client::{ClusterClient, ObjectList, VersionedEvent, WatchEvent, WatchStream};
pub use error::{BoxError, CacheError, ConstructionStage};
pub use kind::{ApiResource, KindKey, ResourceDescriptor};
pub use mapper::{DiscoveryRestMapper, RestMapper, StaticRestMapper};
pub use object::{downcast, object_key, BoxObject, DynamicObject, Object, ObjectKey};
pub use scheme::{KindResolver, Scheme};
pub use stop::{StopHandle, StopSignal};

/// Result type alias using [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;
