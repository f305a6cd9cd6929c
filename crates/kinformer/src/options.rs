//! Cache options and their defaults.

use std::sync::Arc;
use std::time::Duration;

use kinformer_core::{
    CacheError, ClusterClient, DiscoveryRestMapper, KindResolver, RestMapper, Result, Scheme,
};
use tracing::debug;

/// Resync period used when none is configured.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(10 * 60 * 60);

/// Optional cache settings. Unset fields are filled by [`resolve_defaults`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Resolves objects to kinds.
    pub scheme: Option<Arc<dyn KindResolver>>,
    /// Maps kinds to API resources.
    pub mapper: Option<Arc<dyn RestMapper>>,
    /// Full relist interval of every informer.
    pub resync: Option<Duration>,
}

impl Options {
    /// Options with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kind resolver.
    #[must_use]
    pub fn with_scheme(mut self, scheme: Arc<dyn KindResolver>) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Set the REST mapper.
    #[must_use]
    pub fn with_mapper(mut self, mapper: Arc<dyn RestMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Set the resync period.
    #[must_use]
    pub fn with_resync(mut self, resync: Duration) -> Self {
        self.resync = Some(resync);
        self
    }
}

/// Fully populated options, fixed for the lifetime of a cache.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    scheme: Arc<dyn KindResolver>,
    mapper: Arc<dyn RestMapper>,
    resync: Duration,
}

impl ResolvedOptions {
    /// The kind resolver.
    #[inline]
    pub fn scheme(&self) -> &Arc<dyn KindResolver> {
        &self.scheme
    }

    /// The REST mapper.
    #[inline]
    pub fn mapper(&self) -> &Arc<dyn RestMapper> {
        &self.mapper
    }

    /// The resync period.
    #[inline]
    pub fn resync(&self) -> Duration {
        self.resync
    }
}

/// Fill the unset fields of `options`.
///
/// - no scheme: [`Scheme::global`]
/// - no mapper: discovery against `client`; failure is
///   [`CacheError::MapperDiscovery`]
/// - no resync: [`DEFAULT_RESYNC_PERIOD`]
///
/// Values the caller set are kept as they are.
pub async fn resolve_defaults(client: &dyn ClusterClient, options: Options) -> Result<ResolvedOptions> {
    let scheme: Arc<dyn KindResolver> = match options.scheme {
        Some(scheme) => scheme,
        None => Scheme::global(),
    };

    let mapper: Arc<dyn RestMapper> = match options.mapper {
        Some(mapper) => mapper,
        None => {
            let mapper = DiscoveryRestMapper::discover(client)
                .await
                .map_err(|e| CacheError::MapperDiscovery { source: Box::new(e) })?;
            debug!(resources = mapper.len(), "built REST mapper from discovery");
            Arc::new(mapper)
        }
    };

    Ok(ResolvedOptions {
        scheme,
        mapper,
        resync: options.resync.unwrap_or(DEFAULT_RESYNC_PERIOD),
    })
}
