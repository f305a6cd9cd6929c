//! Builder for configuring and creating an [`InformerCache`].

use std::sync::Arc;
use std::time::Duration;

use kinformer_cache::{InformerConfig, InformerFactory, SharedInformerFactory};
use kinformer_core::{CacheError, ClusterClient, KindResolver, RestMapper, Result};
use tracing::Span;

use crate::informer_cache::InformerCache;
use crate::options::{resolve_defaults, Options};

/// Builder for creating an [`InformerCache`].
///
/// # Example
///
/// ```rust,ignore
/// use kinformer::CacheBuilder;
/// use std::time::Duration;
///
/// let cache = CacheBuilder::new()
///     .client(client)
///     .resync_period(Duration::from_secs(600))
///     .span(tracing::info_span!("cache"))
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct CacheBuilder {
    client: Option<Arc<dyn ClusterClient>>,
    options: Options,
    informer_factory: Option<Arc<dyn InformerFactory>>,
    informer_config: Option<InformerConfig>,
    sync_poll_interval: Option<Duration>,
    span: Option<Span>,
}

impl CacheBuilder {
    /// Create a new cache builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cluster client.
    ///
    /// This is required.
    pub fn client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Set the kind resolver.
    ///
    /// If not set, the global scheme is used.
    pub fn scheme(mut self, scheme: Arc<dyn KindResolver>) -> Self {
        self.options.scheme = Some(scheme);
        self
    }

    /// Set the REST mapper.
    ///
    /// If not set, one is built from discovery.
    pub fn mapper(mut self, mapper: Arc<dyn RestMapper>) -> Self {
        self.options.mapper = Some(mapper);
        self
    }

    /// Set the full relist interval.
    pub fn resync_period(mut self, resync: Duration) -> Self {
        self.options.resync = Some(resync);
        self
    }

    /// Use a custom informer factory instead of [`SharedInformerFactory`].
    pub fn informer_factory(mut self, factory: Arc<dyn InformerFactory>) -> Self {
        self.informer_factory = Some(factory);
        self
    }

    /// Tune the bundled informers. Ignored with a custom factory.
    pub fn informer_config(mut self, config: InformerConfig) -> Self {
        self.informer_config = Some(config);
        self
    }

    /// Set how often sync waits poll the informers.
    pub fn sync_poll_interval(mut self, interval: Duration) -> Self {
        self.sync_poll_interval = Some(interval);
        self
    }

    /// Emit all cache and informer events inside `span`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Build the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No client was provided
    /// - No mapper was provided and discovery fails
    pub async fn build(self) -> Result<InformerCache> {
        let client = self
            .client
            .ok_or_else(|| CacheError::Configuration("client is required".into()))?;
        let span = self.span.unwrap_or_else(Span::none);

        let options = resolve_defaults(client.as_ref(), self.options).await?;

        let factory: Arc<dyn InformerFactory> = match self.informer_factory {
            Some(factory) => factory,
            None => Arc::new(
                SharedInformerFactory::new(client)
                    .config(self.informer_config.unwrap_or_default())
                    .span(span.clone()),
            ),
        };

        Ok(InformerCache::from_parts(options, factory, span, self.sync_poll_interval))
    }
}
