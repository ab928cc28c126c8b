//! The ambient context shared by request blocks.

use std::fmt;
use std::sync::Arc;

use reqblock_cache::CacheStore;
use reqblock_data::Fetcher;
use serde_json::Value as JsonValue;

use crate::{ProviderConfig, SsrRegistry};

/// Everything a request block needs from its surroundings.
///
/// Blocks built with the same context share its cache, so requests with equal
/// fingerprints are made once.
pub struct RequestBlockContext {
    /// Shared cache.
    pub cache: Arc<CacheStore>,
    /// Default options merged under each block's own.
    pub options: Option<JsonValue>,
    /// Prefix for locations without a scheme.
    pub origin: Option<String>,
    /// Network capability.
    pub fetcher: Arc<dyn Fetcher>,
    /// Server-render registry, when rendering on a server.
    pub render_promises: Option<Arc<dyn SsrRegistry>>,
}

impl fmt::Debug for RequestBlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBlockContext")
            .field("cache", &self.cache)
            .field("options", &self.options)
            .field("origin", &self.origin)
            .field("render_promises", &self.render_promises.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`RequestBlockContext`].
pub struct RequestBlockProvider {
    cache: Option<Arc<CacheStore>>,
    options: Option<JsonValue>,
    origin: Option<String>,
    fetcher: Arc<dyn Fetcher>,
    render_promises: Option<Arc<dyn SsrRegistry>>,
}

impl RequestBlockProvider {
    /// Start a provider around a fetcher.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            cache: None,
            options: None,
            origin: None,
            fetcher,
            render_promises: None,
        }
    }

    /// Start a provider from configuration.
    ///
    /// `ssr_mode` selects a server-mode cache; the registry is still attached
    /// separately with [`with_render_promises`](Self::with_render_promises).
    pub fn from_config(config: &ProviderConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let mut provider = Self::new(fetcher)
            .with_cache(Arc::new(CacheStore::with_server_mode(config.ssr_mode)));
        provider.options = config.options.clone();
        provider.origin = config.origin.clone();
        provider
    }

    /// Use an existing cache, e.g. one restored from a server snapshot.
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the default options.
    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = Some(options);
        self
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach a server-render registry.
    pub fn with_render_promises(mut self, registry: Arc<dyn SsrRegistry>) -> Self {
        self.render_promises = Some(registry);
        self
    }

    /// Build the shared context. Without an explicit cache a fresh client
    /// cache is created.
    pub fn build(self) -> Arc<RequestBlockContext> {
        Arc::new(RequestBlockContext {
            cache: self.cache.unwrap_or_else(|| Arc::new(CacheStore::new())),
            options: self.options,
            origin: self.origin,
            fetcher: self.fetcher,
            render_promises: self.render_promises,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqblock_data::StaticFetcher;
    use serde_json::json;

    #[test]
    fn test_build_creates_client_cache() {
        let context = RequestBlockProvider::new(Arc::new(StaticFetcher::new())).build();
        assert!(!context.cache.server_mode());
        assert!(context.options.is_none());
        assert!(context.render_promises.is_none());
    }

    #[test]
    fn test_from_config() {
        let config = ProviderConfig::default()
            .with_origin("https://api.example.com")
            .with_options(json!({"headers": {"accept": "application/json"}}))
            .server();
        let context = RequestBlockProvider::from_config(&config, Arc::new(StaticFetcher::new())).build();

        assert!(context.cache.server_mode());
        assert_eq!(context.origin.as_deref(), Some("https://api.example.com"));
        assert_eq!(context.options, config.options);
    }

    #[test]
    fn test_with_cache_is_shared() {
        let cache = Arc::new(CacheStore::new());
        let context = RequestBlockProvider::new(Arc::new(StaticFetcher::new()))
            .with_cache(Arc::clone(&cache))
            .build();
        assert!(Arc::ptr_eq(&cache, &context.cache));
    }
}
