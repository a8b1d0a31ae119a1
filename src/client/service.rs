//! The facade every domain service talks to.

use super::builder::ApiServiceBuilder;
use crate::cache::{CacheConfig, CacheKeyGenerator, CacheManager, CacheStats};
use crate::interceptors::{Interceptor, InterceptorHandle};
use crate::resilience::{CircuitBreakerPolicy, RetryPolicy};
use crate::transport::Transport;
use crate::types::{
    ApiResponse, CachePolicy, HttpMethod, RawResponse, RequestConfig, TransportKind, CLIENT_HEADER,
};
use crate::{ApiError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Defaults merged under every call; per-call values win.
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub cache: CachePolicy,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
}

/// Routes requests to the HTTP or query-store transport and owns the shared cache.
pub struct ApiService {
    http: Arc<dyn Transport>,
    store: Arc<dyn Transport>,
    cache: Arc<CacheManager>,
    defaults: RequestDefaults,
}

impl ApiService {
    pub fn builder() -> ApiServiceBuilder {
        ApiServiceBuilder::new()
    }

    /// Assemble from parts. Both transports should share `cache`.
    pub fn from_parts(
        http: Arc<dyn Transport>,
        store: Arc<dyn Transport>,
        cache: Arc<CacheManager>,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            http,
            store,
            cache,
            defaults,
        }
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Per-call config over service defaults. The caller's value is not touched.
    ///
    /// Header names come out lowercase, so a caller's `Authorization` replaces
    /// a default `authorization`.
    pub fn merge_config(&self, config: &RequestConfig) -> RequestConfig {
        let mut merged = config.clone();
        merged.headers = self
            .defaults
            .headers
            .iter()
            .chain(config.headers.iter())
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        merged.timeout = config.timeout.or(self.defaults.timeout);
        merged.cache = self.defaults.cache.merged(&config.cache);
        merged.retry = self.defaults.retry.merged(&config.retry);
        merged.circuit_breaker = self.defaults.circuit_breaker.merged(&config.circuit_breaker);
        merged
    }

    /// Explicit `client` wins, then `x-client`, then the URL shape: anything
    /// not starting with `/` or `http` is a table name.
    pub fn route(&self, config: &RequestConfig) -> TransportKind {
        if let Some(kind) = config.client {
            return kind;
        }
        match config.header(CLIENT_HEADER).map(str::to_ascii_lowercase).as_deref() {
            Some("store") => return TransportKind::Store,
            Some("http") => return TransportKind::Http,
            _ => {}
        }
        if config.url.starts_with('/') || config.url.starts_with("http") {
            TransportKind::Http
        } else {
            TransportKind::Store
        }
    }

    fn transport(&self, kind: TransportKind) -> &Arc<dyn Transport> {
        match kind {
            TransportKind::Http => &self.http,
            TransportKind::Store => &self.store,
        }
    }

    async fn send(&self, config: &RequestConfig) -> Result<(TransportKind, RawResponse)> {
        let merged = self.merge_config(config);
        let kind = self.route(&merged);
        debug!(
            transport = kind.name(),
            method = merged.method.as_str(),
            url = merged.url.as_str(),
            "fait-api routing request"
        );
        match self.transport(kind).execute(merged).await {
            Ok(resp) => Ok((kind, resp)),
            Err(err) => {
                debug!(
                    transport = kind.name(),
                    status = err.status.unwrap_or(0),
                    code = err.code.as_deref().unwrap_or(""),
                    "fait-api request failed: {}",
                    err.message
                );
                Err(err)
            }
        }
    }

    /// Issue a request and return the untyped payload.
    pub async fn request_raw(&self, config: &RequestConfig) -> Result<RawResponse> {
        self.send(config).await.map(|(_, resp)| resp)
    }

    /// Issue a request and decode its payload into `T`. A payload that does
    /// not decode fails with `ERR_DECODE` after passing through the routed
    /// transport's error interceptors.
    pub async fn request<T: DeserializeOwned>(&self, config: &RequestConfig) -> Result<ApiResponse<T>> {
        let (kind, raw) = self.send(config).await?;
        match raw.decode() {
            Ok(resp) => Ok(resp),
            Err(err) => {
                debug!(
                    transport = kind.name(),
                    status = err.status.unwrap_or(0),
                    "fait-api response did not decode: {}",
                    err.message
                );
                Err(self.transport(kind).interceptors().error.apply_error(err).await)
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<ApiResponse<T>> {
        self.verb(HttpMethod::Get, url, None, config).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.verb(HttpMethod::Post, url, Some(body), config).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.verb(HttpMethod::Put, url, Some(body), config).await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        self.verb(HttpMethod::Patch, url, Some(body), config).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<ApiResponse<T>> {
        self.verb(HttpMethod::Delete, url, None, config).await
    }

    async fn verb<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        let mut config = config.with_method(method);
        config.url = url.to_string();
        if let Some(body) = body {
            config = config.with_json(body);
        }
        self.request(&config).await
    }

    /// Register on both transports; the returned handle removes both entries.
    pub fn add_request_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: Interceptor<RequestConfig> + 'static,
    {
        let shared: Arc<dyn Interceptor<RequestConfig>> = Arc::new(interceptor);
        self.http
            .interceptors()
            .request
            .add_shared(shared.clone())
            .combine(self.store.interceptors().request.add_shared(shared))
    }

    pub fn add_response_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: Interceptor<RawResponse> + 'static,
    {
        let shared: Arc<dyn Interceptor<RawResponse>> = Arc::new(interceptor);
        self.http
            .interceptors()
            .response
            .add_shared(shared.clone())
            .combine(self.store.interceptors().response.add_shared(shared))
    }

    pub fn add_error_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: Interceptor<ApiError> + 'static,
    {
        let shared: Arc<dyn Interceptor<ApiError>> = Arc::new(interceptor);
        self.http
            .interceptors()
            .error
            .add_shared(shared.clone())
            .combine(self.store.interceptors().error.add_shared(shared))
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn configure_cache(&self, default_ttl: Duration) {
        self.cache.configure(default_ttl);
    }

    pub fn set_cache_config(&self, config: CacheConfig) {
        self.cache.set_config(config);
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn invalidate_cache_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(prefix)
    }

    pub fn invalidate_cache_matching(&self, pattern: &str) -> Result<usize> {
        self.cache.invalidate_matching(pattern)
    }

    /// Drop cached reads for `url` (and anything below it) on the transport it routes to.
    pub fn invalidate_path(&self, url: &str) -> usize {
        let probe = RequestConfig::get(url);
        let scope = self.transport(self.route(&probe)).cache_scope(url);
        self.cache
            .invalidate_prefix(&CacheKeyGenerator::new().scope(&scope))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
