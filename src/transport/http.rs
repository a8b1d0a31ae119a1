//! Generic HTTP/REST transport.

use super::executor::{HttpExecutor, HttpRequest, TransportError};
use super::Transport;
use crate::cache::CacheManager;
use crate::client::base::{BaseClient, Dispatch};
use crate::interceptors::InterceptorSet;
use crate::types::{
    ApiResponse, HttpMethod, Payload, RawResponse, RequestBody, RequestConfig, TransportKind,
};
use crate::{ApiError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::form_urlencoded::byte_serialize;

pub struct HttpTransport {
    base: BaseClient,
    executor: Arc<dyn HttpExecutor>,
    base_url: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        executor: Arc<dyn HttpExecutor>,
        cache: Arc<CacheManager>,
    ) -> Self {
        Self {
            base: BaseClient::new(cache),
            executor,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn base(&self) -> &BaseClient {
        &self.base
    }

    /// Absolute URL plus query string for `path` and `params`.
    pub fn prepare_url(&self, path: &str, params: &Map<String, Value>) -> String {
        compose_url(&self.base_url, path, params)
    }

    fn build_request(&self, config: &RequestConfig) -> HttpRequest {
        let mut request = HttpRequest::new(config.method, self.prepare_url(&config.url, &config.params));
        for (k, v) in &config.headers {
            request.headers.insert(k.to_ascii_lowercase(), v.clone());
        }

        if config.method == HttpMethod::Get {
            return request;
        }
        let (body, content_type) = match &config.body {
            None => return request,
            Some(RequestBody::Json(v)) => (Bytes::from(v.to_string()), Some("application/json")),
            Some(RequestBody::Text(s)) => (Bytes::from(s.clone()), Some("text/plain; charset=utf-8")),
            Some(RequestBody::Raw { data, content_type }) => {
                if let Some(ct) = content_type {
                    request
                        .headers
                        .entry("content-type".to_string())
                        .or_insert_with(|| ct.clone());
                }
                (data.clone(), None)
            }
        };
        if let Some(ct) = content_type {
            request
                .headers
                .entry("content-type".to_string())
                .or_insert_with(|| ct.to_string());
        }
        request.body = Some(body);
        request
    }
}

#[async_trait]
impl Dispatch for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn effective_url(&self, config: &RequestConfig) -> String {
        join_url(&self.base_url, &config.url)
    }

    async fn dispatch(&self, config: RequestConfig) -> Result<RawResponse> {
        let request = self.build_request(&config);
        let resp = self
            .executor
            .execute(request)
            .await
            .map_err(normalize_transport_error)?;

        let data = parse_payload(&resp.headers, resp.body);
        let mut raw = ApiResponse::raw(resp.status, data, config);
        raw.headers = resp.headers;
        if !raw.is_success() {
            let err = ApiError::from_status(&raw);
            return Err(err.with_config(raw.config));
        }
        Ok(raw)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn interceptors(&self) -> &InterceptorSet {
        self.base.interceptors()
    }

    fn cache_scope(&self, url: &str) -> String {
        join_url(&self.base_url, url)
    }

    async fn execute(&self, config: RequestConfig) -> Result<RawResponse> {
        self.base.run(self, config).await
    }
}

fn normalize_transport_error(e: TransportError) -> ApiError {
    if e.is_timeout() {
        return ApiError::aborted();
    }
    match e {
        TransportError::Http(inner) => ApiError::network(format!("Network Error: {}", inner)),
        TransportError::Other(msg) => ApiError::network(msg),
        TransportError::Timeout => ApiError::aborted(),
    }
}

/// `http…` paths are used verbatim; others are appended to `base_url`.
fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http") || base_url.is_empty() {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Build the request URL: arrays become repeated `key[]=v`, objects one
/// JSON value, scalars their string form; nulls are left out.
pub fn compose_url(base_url: &str, path: &str, params: &Map<String, Value>) -> String {
    let mut url = join_url(base_url, path);
    let mut pairs: Vec<String> = Vec::new();
    for (key, value) in params {
        let key = encode(key);
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push(format!("{}[]={}", key, encode(&param_string(item))));
                }
            }
            other => pairs.push(format!("{}={}", key, encode(&param_string(other)))),
        }
    }
    if !pairs.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&pairs.join("&"));
    }
    url
}

fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// JSON for `application/json` and `+json` types, text for `text/*`,
/// bytes otherwise. Without a content type, a body that parses as JSON is
/// taken as JSON.
pub(crate) fn parse_payload(headers: &BTreeMap<String, String>, body: Bytes) -> Payload {
    if body.is_empty() {
        return Payload::Empty;
    }
    let content_type = headers
        .get("content-type")
        .map(|v| v.to_ascii_lowercase())
        .unwrap_or_default();
    let essence = content_type.split(';').next().unwrap_or("").trim();

    if essence == "application/json" || essence.ends_with("+json") {
        return match serde_json::from_slice(&body) {
            Ok(v) => Payload::Json(v),
            Err(_) => Payload::Text(String::from_utf8_lossy(&body).into_owned()),
        };
    }
    if essence.starts_with("text/") {
        return Payload::Text(String::from_utf8_lossy(&body).into_owned());
    }
    if essence.is_empty() {
        if let Ok(v) = serde_json::from_slice(&body) {
            return Payload::Json(v);
        }
    }
    Payload::Binary(body)
}
