use super::service::{ApiService, RequestDefaults};
use crate::cache::{CacheBackend, CacheConfig, CacheManager, MemoryCache};
use crate::resilience::{CircuitBreakerPolicy, RetryPolicy};
use crate::store::{PostgrestStore, QueryStore};
use crate::transport::{env_parse, HttpExecutor, HttpTransport, ReqwestExecutor, StoreTransport};
use crate::{ApiError, CachePolicy, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ApiService`].
///
/// Environment overrides (see [`from_env`](Self::from_env)):
/// - `FAIT_API_BASE_URL`
/// - `FAIT_API_TIMEOUT_MS`
/// - `FAIT_API_CACHE_TTL_MS`
/// - `FAIT_STORE_URL`, `FAIT_STORE_KEY`
pub struct ApiServiceBuilder {
    base_url: String,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    cache_config: CacheConfig,
    cache_policy: CachePolicy,
    cache_backend: Option<Box<dyn CacheBackend>>,
    executor: Option<Arc<dyn HttpExecutor>>,
    store: Option<Arc<dyn QueryStore>>,
    store_url: Option<String>,
    store_key: Option<String>,
    retry: RetryPolicy,
    circuit_breaker: CircuitBreakerPolicy,
}

impl ApiServiceBuilder {
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            headers: BTreeMap::new(),
            timeout: None,
            cache_config: CacheConfig::default(),
            cache_policy: CachePolicy::default(),
            cache_backend: None,
            executor: None,
            store: None,
            store_url: None,
            store_key: None,
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerPolicy::default(),
        }
    }

    /// Builder seeded from the `FAIT_*` environment variables. Unset or
    /// unparsable values leave the default in place.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Ok(url) = std::env::var("FAIT_API_BASE_URL") {
            builder.base_url = url;
        }
        builder.timeout = env_parse::<u64>("FAIT_API_TIMEOUT_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        if let Some(ms) = env_parse::<u64>("FAIT_API_CACHE_TTL_MS").filter(|ms| *ms > 0) {
            builder.cache_config.default_ttl = Some(Duration::from_millis(ms));
        }
        builder.store_url = std::env::var("FAIT_STORE_URL").ok().filter(|s| !s.is_empty());
        builder.store_key = std::env::var("FAIT_STORE_KEY").ok().filter(|s| !s.is_empty());
        builder
    }

    /// Prefix for HTTP paths that are not already absolute.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_config.default_ttl = Some(ttl);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Cache policy every request starts from; fields a caller sets win.
    /// `CachePolicy::disabled()` turns off GET caching unless a request
    /// opts back in.
    pub fn default_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn cache_backend(mut self, backend: Box<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Network primitive for the HTTP transport. Default: [`ReqwestExecutor`].
    pub fn executor(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Query-store capability. Takes precedence over [`store_url`](Self::store_url).
    pub fn store(mut self, store: Arc<dyn QueryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a [`PostgrestStore`] at `url`.
    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Some(url.into());
        self
    }

    pub fn store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = Some(key.into());
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.circuit_breaker = policy;
        self
    }

    pub fn build(self) -> Result<ApiService> {
        let backend = self
            .cache_backend
            .unwrap_or_else(|| Box::new(MemoryCache::new()));
        let cache = Arc::new(CacheManager::new(self.cache_config, backend));

        let executor: Arc<dyn HttpExecutor> = match self.executor {
            Some(e) => e,
            None => Arc::new(ReqwestExecutor::new().map_err(|e| {
                ApiError::configuration(format!("Failed to build HTTP client: {}", e))
            })?),
        };
        let http = HttpTransport::new(self.base_url, executor, cache.clone());

        let store: Option<Arc<dyn QueryStore>> = match (self.store, self.store_url) {
            (Some(s), _) => Some(s),
            (None, Some(url)) => {
                let mut pg = PostgrestStore::new(url).map_err(|e| ApiError::configuration(e.message))?;
                if let Some(key) = self.store_key {
                    pg = pg
                        .with_api_key(&key)
                        .map_err(|e| ApiError::configuration(e.message))?;
                }
                Some(Arc::new(pg))
            }
            (None, None) => None,
        };
        let store = match store {
            Some(s) => StoreTransport::new(s, cache.clone()),
            None => StoreTransport::unconfigured(cache.clone()),
        };

        let defaults = RequestDefaults {
            headers: self.headers,
            timeout: self.timeout,
            cache: self.cache_policy,
            retry: self.retry,
            circuit_breaker: self.circuit_breaker,
        };
        Ok(ApiService::from_parts(
            Arc::new(http),
            Arc::new(store),
            cache,
            defaults,
        ))
    }
}

impl Default for ApiServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
