//! Policy and pipeline shared by every transport.

use super::cancel::run_with_deadline;
use crate::cache::{CacheKeyGenerator, CacheManager};
use crate::interceptors::InterceptorSet;
use crate::types::{HttpMethod, RawResponse, RequestConfig, TransportKind};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, Instrument};

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

/// The transport-specific step of the pipeline: turn a fully intercepted
/// config into a raw response.
#[async_trait]
pub trait Dispatch: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// URL the request effectively targets; used in cache keys.
    fn effective_url(&self, config: &RequestConfig) -> String;

    async fn dispatch(&self, config: RequestConfig) -> Result<RawResponse>;
}

/// Interceptor registries plus cache policy for one transport.
#[derive(Clone)]
pub struct BaseClient {
    interceptors: InterceptorSet,
    cache: Arc<CacheManager>,
    keys: CacheKeyGenerator,
}

impl BaseClient {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            interceptors: InterceptorSet::new(),
            cache,
            keys: CacheKeyGenerator::new(),
        }
    }

    pub fn interceptors(&self) -> &InterceptorSet {
        &self.interceptors
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// GET requests whose cache policy is not explicitly disabled.
    pub fn should_cache(&self, config: &RequestConfig) -> bool {
        config.method == HttpMethod::Get && !config.cache.is_disabled()
    }

    /// `None` for non-GET requests.
    pub fn cache_key(&self, config: &RequestConfig, effective_url: &str) -> Option<String> {
        self.keys
            .generate(config.method, effective_url, &config.params)
            .map(|k| k.as_str().to_string())
    }

    /// Per-request TTL, else the cache's configured default, else five minutes.
    pub fn cache_ttl(&self, config: &RequestConfig) -> Duration {
        config.cache.ttl.unwrap_or_else(|| self.cache.default_ttl())
    }

    /// Run one request through interceptors, cache, deadline and dispatch.
    pub async fn run(&self, dispatcher: &dyn Dispatch, config: RequestConfig) -> Result<RawResponse> {
        let mut config = config;
        let request_id = match config.header(REQUEST_ID_HEADER) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                config.headers.insert(REQUEST_ID_HEADER.to_string(), id.clone());
                id
            }
        };
        let span = tracing::debug_span!(
            "fait_api.request",
            request_id = request_id.as_str(),
            transport = dispatcher.kind().name(),
            method = config.method.as_str(),
            url = config.url.as_str(),
        );

        async move {
            let echo = config.clone();
            match self.run_stages(dispatcher, config).await {
                Ok(resp) => Ok(resp),
                Err(err) => {
                    let err = err.or_config(&echo);
                    Err(self.interceptors.error.apply_error(err).await)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, dispatcher: &dyn Dispatch, config: RequestConfig) -> Result<RawResponse> {
        let config = self.interceptors.request.apply(config).await?;

        let key = if self.should_cache(&config) {
            self.cache_key(&config, &dispatcher.effective_url(&config))
        } else {
            None
        };

        if let Some(ref key) = key {
            if let Some(mut hit) = self.cache.get(key) {
                debug!(cache_key = key.as_str(), "fait-api cache hit");
                hit.cached = true;
                hit.config = config;
                return self.interceptors.response.apply(hit).await;
            }
        }

        let start = Instant::now();
        let timeout = config.timeout;
        let cancel = config.cancel.clone();
        let echo = config.clone();
        let result = run_with_deadline(timeout, cancel, dispatcher.dispatch(config)).await;

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                debug!(
                    status = err.status.unwrap_or(0),
                    code = err.code.as_deref().unwrap_or(""),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "fait-api request failed"
                );
                return Err(err.or_config(&echo));
            }
        };
        debug!(
            status = resp.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "fait-api request completed"
        );

        if let Some(key) = key {
            self.cache.set(&key, resp.clone(), Some(self.cache_ttl(&echo)));
        }
        self.interceptors.response.apply(resp).await
    }
}
