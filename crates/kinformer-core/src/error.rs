//! Error types for cache operations.
//!
//! This module provides [`CacheError`], the single error type shared by every
//! kinformer crate.

use std::fmt;

use crate::KindKey;

/// Boxed source error carried by wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The stage at which informer construction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionStage {
    /// Mapping the kind to its backing API resource.
    Mapping,
    /// Building the informer itself.
    Informer,
}

impl fmt::Display for ConstructionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapping => f.write_str("resource mapping"),
            Self::Informer => f.write_str("informer construction"),
        }
    }
}

/// Error type for cache operations.
///
/// Failures to sync are not represented here: `wait_for_cache_sync`
/// reports them as a `false` return.
///
/// # Example
///
/// ```rust
/// use kinformer_core::{CacheError, KindKey};
///
/// let err = CacheError::DuplicateIndex {
///     kind: KindKey::new("", "v1", "Pod"),
///     field: "spec.nodeName".to_string(),
/// };
/// assert!(err.to_string().contains("spec.nodeName"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The kind of an object could not be determined.
    #[error("could not resolve kind for {type_name}: {reason}")]
    Resolution {
        /// Rust type name of the object.
        type_name: String,
        /// Why resolution failed.
        reason: String,
    },

    /// Discovery failed while building the default REST mapper.
    #[error("could not create REST mapper from discovery")]
    MapperDiscovery {
        /// Underlying discovery error.
        #[source]
        source: BoxError,
    },

    /// The mapper knows no resource for the kind.
    #[error("no resource mapping for {kind}")]
    NoResourceMapping {
        /// The unmapped kind.
        kind: KindKey,
    },

    /// Building the informer for a kind failed. Retryable.
    #[error("failed to create informer for {kind} during {stage}")]
    PrimitiveConstruction {
        /// The kind being constructed.
        kind: KindKey,
        /// Where construction failed.
        stage: ConstructionStage,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// A different index is already registered under this field.
    #[error("index {field} already registered for {kind}")]
    DuplicateIndex {
        /// The kind the index belongs to.
        kind: KindKey,
        /// The conflicting field name.
        field: String,
    },

    /// A query named an index that is not registered.
    #[error("index {index} does not exist for {kind}")]
    UnknownIndex {
        /// The kind queried.
        kind: KindKey,
        /// The missing index name.
        index: String,
    },

    /// `start` was called more than once.
    #[error("cache already started")]
    AlreadyStarted,

    /// A read was attempted before `start`.
    #[error("cache not started")]
    NotStarted,

    /// The cache's stop signal fired.
    #[error("cache stopped")]
    Stopped,

    /// Object is not present in the cache.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of the object.
        kind: KindKey,
        /// `namespace/name` or `name`.
        key: String,
    },

    /// Invalid cache configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The cluster client failed.
    #[error("cluster client error: {message}")]
    Client {
        /// Description of the failure.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<BoxError>,
    },
}

impl CacheError {
    /// Create a client error from any error type.
    pub fn client<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Client {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error from any error type.
    pub fn internal<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap an error raised while constructing the informer for `kind`.
    pub fn construction(kind: &KindKey, stage: ConstructionStage, source: CacheError) -> Self {
        Self::PrimitiveConstruction {
            kind: kind.clone(),
            stage,
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PrimitiveConstruction { .. } | Self::Client { .. })
    }
}
