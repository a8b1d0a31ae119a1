//! Structured query-store transport.

use super::Transport;
use crate::cache::CacheManager;
use crate::client::base::{BaseClient, Dispatch};
use crate::error_code::ErrorCode;
use crate::interceptors::InterceptorSet;
use crate::store::{QueryBuilder, QueryStore, StoreError, StoreResponse};
use crate::types::{
    ApiResponse, FilterOperator, FilterParam, HttpMethod, Payload, QuerySpec, RawResponse,
    RequestConfig, RowMode, TransportKind,
};
use crate::{ApiError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Header carrying the row count reported by the store.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

pub struct StoreTransport {
    base: BaseClient,
    store: Option<Arc<dyn QueryStore>>,
}

impl StoreTransport {
    pub fn new(store: Arc<dyn QueryStore>, cache: Arc<CacheManager>) -> Self {
        Self {
            base: BaseClient::new(cache),
            store: Some(store),
        }
    }

    /// A transport whose every request fails with a configuration error.
    pub fn unconfigured(cache: Arc<CacheManager>) -> Self {
        Self {
            base: BaseClient::new(cache),
            store: None,
        }
    }

    pub fn base(&self) -> &BaseClient {
        &self.base
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    /// Validate `config` and issue the builder calls for it. Fails before
    /// touching the store if the request is malformed.
    pub fn build_query(&self, config: &RequestConfig) -> Result<Box<dyn QueryBuilder>> {
        let table = table_name(&config.url)?;
        let spec = QuerySpec::from_params(&config.params)?;
        let body = match config.method {
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => Some(json_body(config)?),
            HttpMethod::Get | HttpMethod::Delete => None,
        };
        check_filters(&spec.filters)?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ApiError::configuration("No query store is configured"))?;

        let mut query = store.from(table);
        match (config.method, body) {
            (HttpMethod::Get, _) => {
                query.select(spec.select.as_deref().unwrap_or("*"));
                apply_filters(query.as_mut(), &spec.filters)?;
                for sort in &spec.sort {
                    query.order(&sort.field, sort.direction.is_ascending());
                }
                if let Some(p) = spec.pagination {
                    match (p.range(), p.limit) {
                        (Some((from, to)), _) => query.range(from, to),
                        (None, Some(limit)) => query.limit(limit),
                        (None, None) => {}
                    }
                }
                match spec.row_mode {
                    RowMode::Single => query.single(),
                    RowMode::MaybeSingle => query.maybe_single(),
                    RowMode::Many => {}
                }
            }
            (HttpMethod::Post, Some(body)) => query.insert(&body),
            (HttpMethod::Put, Some(body)) => query.upsert(&body),
            (HttpMethod::Patch, Some(body)) => {
                query.update(&body);
                apply_filters(query.as_mut(), &spec.filters)?;
            }
            (HttpMethod::Delete, _) => {
                query.delete();
                apply_filters(query.as_mut(), &spec.filters)?;
            }
            (method, None) => {
                return Err(ApiError::invalid_request(format!(
                    "{} to the query store requires a JSON body",
                    method
                )))
            }
        }
        Ok(query)
    }
}

#[async_trait]
impl Dispatch for StoreTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Store
    }

    fn effective_url(&self, config: &RequestConfig) -> String {
        config.url.trim_start_matches('/').to_string()
    }

    async fn dispatch(&self, config: RequestConfig) -> Result<RawResponse> {
        let query = self.build_query(&config)?;
        match query.execute().await {
            Ok(resp) => Ok(into_raw(resp, config)),
            Err(e) => Err(normalize_store_error(e).with_config(config)),
        }
    }
}

#[async_trait]
impl Transport for StoreTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Store
    }

    fn interceptors(&self) -> &InterceptorSet {
        self.base.interceptors()
    }

    fn cache_scope(&self, url: &str) -> String {
        url.trim_start_matches('/').to_string()
    }

    async fn execute(&self, config: RequestConfig) -> Result<RawResponse> {
        self.base.run(self, config).await
    }
}

fn table_name(url: &str) -> Result<&str> {
    let table = url.strip_prefix('/').unwrap_or(url);
    if table.is_empty() {
        return Err(ApiError::invalid_request("Query-store requests need a table name"));
    }
    Ok(table)
}

fn json_body(config: &RequestConfig) -> Result<Value> {
    config
        .body
        .as_ref()
        .and_then(|b| b.as_json())
        .cloned()
        .ok_or_else(|| {
            ApiError::invalid_request(format!(
                "{} to the query store requires a JSON body",
                config.method
            ))
        })
}

fn check_filters(filters: &[FilterParam]) -> Result<()> {
    for f in filters {
        match (f.operator, &f.value) {
            (FilterOperator::In, Value::Array(_)) => {}
            (FilterOperator::In, other) => {
                return Err(ApiError::invalid_request(format!(
                    "Filter `in` on `{}` needs an array, got {}",
                    f.field, other
                )))
            }
            (
                FilterOperator::Like
                | FilterOperator::Ilike
                | FilterOperator::StartsWith
                | FilterOperator::EndsWith,
                _,
            ) => {
                pattern(f)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn apply_filters(query: &mut dyn QueryBuilder, filters: &[FilterParam]) -> Result<()> {
    for f in filters {
        let field = f.field.as_str();
        match f.operator {
            FilterOperator::Eq => query.eq(field, &f.value),
            FilterOperator::Neq => query.neq(field, &f.value),
            FilterOperator::Gt => query.gt(field, &f.value),
            FilterOperator::Gte => query.gte(field, &f.value),
            FilterOperator::Lt => query.lt(field, &f.value),
            FilterOperator::Lte => query.lte(field, &f.value),
            FilterOperator::Like => query.like(field, &pattern(f)?),
            FilterOperator::Ilike => query.ilike(field, &pattern(f)?),
            FilterOperator::In => match &f.value {
                Value::Array(values) => query.in_(field, values),
                other => {
                    return Err(ApiError::invalid_request(format!(
                        "Filter `in` on `{}` needs an array, got {}",
                        field, other
                    )))
                }
            },
            FilterOperator::Is => query.is(field, &f.value),
            FilterOperator::Contains => query.contains(field, &f.value),
            FilterOperator::Overlaps => query.overlaps(field, &f.value),
            FilterOperator::StartsWith => query.like(field, &format!("{}%", pattern(f)?)),
            FilterOperator::EndsWith => query.like(field, &format!("%{}", pattern(f)?)),
        }
    }
    Ok(())
}

fn pattern(f: &FilterParam) -> Result<String> {
    match &f.value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ApiError::invalid_request(format!(
            "Filter `{}` on `{}` needs a string value, got {}",
            f.operator, f.field, other
        ))),
    }
}

fn into_raw(resp: StoreResponse, config: RequestConfig) -> RawResponse {
    let mut raw = ApiResponse::raw(resp.status, Payload::Json(resp.data), config);
    if !resp.status_text.is_empty() {
        raw.status_text = resp.status_text;
    }
    if let Some(count) = resp.count {
        raw.headers
            .insert(TOTAL_COUNT_HEADER.to_string(), count.to_string());
    }
    raw
}

/// No-rows becomes 404; everything else keeps the backend's message, code and details.
fn normalize_store_error(e: StoreError) -> ApiError {
    let status = if e.is_no_rows() { Some(404) } else { e.status };
    let details = match (e.details, e.hint) {
        (Some(d), _) => Some(d),
        (None, Some(hint)) => Some(serde_json::json!({ "hint": hint })),
        (None, None) => None,
    };
    let mut err = ApiError::new(e.message);
    err.status = status;
    err.code = e.code.or_else(|| Some(ErrorCode::BadResponse.code().to_string()));
    err.details = details;
    err
}
