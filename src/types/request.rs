use crate::resilience::{CircuitBreakerPolicy, RetryPolicy};
use crate::types::query::{FilterParam, Pagination, SortParam};
use crate::{ApiError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Header that forces routing to the query-store transport when set to `store`.
pub const CLIENT_HEADER: &str = "x-client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(ApiError::invalid_request(format!(
                "Unsupported HTTP method: {}",
                other
            ))),
        }
    }
}

/// Which transport executes a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Http,
    Store,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Store => "store",
        }
    }
}

/// Per-request cache policy. Unset fields fall back to the service defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: Option<bool>,
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            enabled: Some(true),
            ttl: Some(ttl),
        }
    }

    /// Field-by-field merge; fields set on `other` win.
    pub fn merged(&self, other: &CachePolicy) -> CachePolicy {
        CachePolicy {
            enabled: other.enabled.or(self.enabled),
            ttl: other.ttl.or(self.ttl),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.enabled == Some(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    /// Opaque bytes (for example a pre-encoded multipart form), sent unmodified.
    Raw {
        data: Bytes,
        content_type: Option<String>,
    },
}

impl RequestBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// One request, as issued by a caller.
///
/// `params` is a free-form JSON map. Transport A turns it into a query string;
/// Transport B reads the `select`, `filters`, `sort`, `pagination`, `single`
/// and `maybeSingle` entries from it (see [`QuerySpec`](crate::types::QuerySpec)).
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub url: String,
    pub method: HttpMethod,
    /// Header names are stored lowercase when set through [`with_header`](Self::with_header).
    pub headers: BTreeMap<String, String>,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub cache: CachePolicy,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerPolicy,
    pub cancel: Option<CancellationToken>,
    /// Explicit transport choice; takes precedence over header and URL-shape routing.
    pub client: Option<TransportKind>,
}

impl RequestConfig {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = Some(ttl);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = Some(false);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_client(mut self, kind: TransportKind) -> Self {
        self.client = Some(kind);
        self
    }

    pub fn select(self, columns: impl Into<String>) -> Self {
        self.with_param("select", columns.into())
    }

    pub fn filter(mut self, filter: FilterParam) -> Self {
        let entry = self
            .params
            .entry("filters")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = serde_json::Value::Array(Vec::new());
        }
        if let serde_json::Value::Array(items) = entry {
            items.push(filter.to_value());
        }
        self
    }

    pub fn sort(mut self, sort: SortParam) -> Self {
        let entry = self
            .params
            .entry("sort")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = serde_json::Value::Array(Vec::new());
        }
        if let serde_json::Value::Array(items) = entry {
            items.push(sort.to_value());
        }
        self
    }

    pub fn paginate(self, pagination: Pagination) -> Self {
        self.with_param("pagination", pagination.to_value())
    }

    pub fn single(self) -> Self {
        self.with_param("single", true)
    }

    pub fn maybe_single(self) -> Self {
        self.with_param("maybeSingle", true)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
