//! `QueryStore` over a PostgREST-compatible HTTP endpoint.

use super::{QueryBuilder, QueryStore, StoreError, StoreResponse};
use crate::types::response::status_text;
use crate::types::RowMode;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

/// PostgREST client. `base_url` is the REST root, e.g. `https://db.example.com/rest/v1`.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl PostgrestStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fait-api/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| StoreError::new(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Sends `apikey: <key>` and `Authorization: Bearer <key>`.
    pub fn with_api_key(mut self, key: &str) -> Result<Self, StoreError> {
        self.headers.insert(HeaderName::from_static("apikey"), header_value(key)?);
        self.headers
            .insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
        Ok(self)
    }

    /// Select a non-default schema via `Accept-Profile`/`Content-Profile`.
    pub fn with_schema(mut self, schema: &str) -> Result<Self, StoreError> {
        let value = header_value(schema)?;
        self.headers
            .insert(HeaderName::from_static("accept-profile"), value.clone());
        self.headers
            .insert(HeaderName::from_static("content-profile"), value);
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl QueryStore for PostgrestStore {
    fn from(&self, table: &str) -> Box<dyn QueryBuilder> {
        Box::new(PostgrestQuery {
            client: self.client.clone(),
            url: format!("{}/{}", self.base_url, table),
            headers: self.headers.clone(),
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            row_mode: RowMode::Many,
            action: Action::Select,
        })
    }
}

fn header_value(v: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(v).map_err(|e| StoreError::new(format!("Invalid header value: {}", e)))
}

#[derive(Debug, Clone)]
enum Action {
    Select,
    Insert(Value),
    Upsert(Value),
    Update(Value),
    Delete,
}

struct PostgrestQuery {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    row_mode: RowMode,
    action: Action,
}

impl PostgrestQuery {
    fn filter(&mut self, field: &str, op: &str, operand: String) {
        self.filters
            .push((field.to_string(), format!("{}.{}", op, operand)));
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let select = match (&self.action, &self.select) {
            (_, Some(cols)) => Some(cols.clone()),
            (Action::Select, None) => Some("*".to_string()),
            _ => None,
        };
        if let Some(cols) = select {
            pairs.push(("select".to_string(), cols));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(l) = self.limit {
            pairs.push(("limit".to_string(), l.to_string()));
        }
        if let Some(o) = self.offset {
            pairs.push(("offset".to_string(), o.to_string()));
        }
        pairs
    }
}

#[async_trait]
impl QueryBuilder for PostgrestQuery {
    fn select(&mut self, columns: &str) {
        self.select = Some(columns.split_whitespace().collect::<Vec<_>>().join(""));
    }

    fn eq(&mut self, field: &str, value: &Value) {
        self.filter(field, "eq", scalar(value));
    }

    fn neq(&mut self, field: &str, value: &Value) {
        self.filter(field, "neq", scalar(value));
    }

    fn gt(&mut self, field: &str, value: &Value) {
        self.filter(field, "gt", scalar(value));
    }

    fn gte(&mut self, field: &str, value: &Value) {
        self.filter(field, "gte", scalar(value));
    }

    fn lt(&mut self, field: &str, value: &Value) {
        self.filter(field, "lt", scalar(value));
    }

    fn lte(&mut self, field: &str, value: &Value) {
        self.filter(field, "lte", scalar(value));
    }

    fn like(&mut self, field: &str, pattern: &str) {
        self.filter(field, "like", pattern.to_string());
    }

    fn ilike(&mut self, field: &str, pattern: &str) {
        self.filter(field, "ilike", pattern.to_string());
    }

    fn in_(&mut self, field: &str, values: &[Value]) {
        let items: Vec<String> = values.iter().map(|v| quoted(&scalar(v))).collect();
        self.filter(field, "in", format!("({})", items.join(",")));
    }

    fn is(&mut self, field: &str, value: &Value) {
        self.filter(field, "is", scalar(value));
    }

    fn contains(&mut self, field: &str, value: &Value) {
        self.filter(field, "cs", collection(value));
    }

    fn overlaps(&mut self, field: &str, value: &Value) {
        self.filter(field, "ov", collection(value));
    }

    fn order(&mut self, field: &str, ascending: bool) {
        let dir = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", field, dir));
    }

    fn limit(&mut self, count: u64) {
        self.limit = Some(count);
    }

    fn range(&mut self, from: u64, to: u64) {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
    }

    fn single(&mut self) {
        self.row_mode = RowMode::Single;
    }

    fn maybe_single(&mut self) {
        self.row_mode = RowMode::MaybeSingle;
    }

    fn insert(&mut self, values: &Value) {
        self.action = Action::Insert(values.clone());
    }

    fn upsert(&mut self, values: &Value) {
        self.action = Action::Upsert(values.clone());
    }

    fn update(&mut self, values: &Value) {
        self.action = Action::Update(values.clone());
    }

    fn delete(&mut self) {
        self.action = Action::Delete;
    }

    async fn execute(self: Box<Self>) -> Result<StoreResponse, StoreError> {
        let mut url = reqwest::Url::parse(&self.url)
            .map_err(|e| StoreError::new(format!("Invalid store URL '{}': {}", self.url, e)))?;
        let pairs = self.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        let (method, body, prefer) = match &self.action {
            Action::Select => (reqwest::Method::GET, None, None),
            Action::Insert(v) => (reqwest::Method::POST, Some(v), Some("return=representation")),
            Action::Upsert(v) => (
                reqwest::Method::POST,
                Some(v),
                Some("return=representation,resolution=merge-duplicates"),
            ),
            Action::Update(v) => (reqwest::Method::PATCH, Some(v), Some("return=representation")),
            Action::Delete => (reqwest::Method::DELETE, None, Some("return=representation")),
        };

        let mut req = self.client.request(method, url).headers(self.headers.clone());
        if let Some(p) = prefer {
            req = req.header("prefer", p);
        }
        if self.row_mode == RowMode::Single {
            req = req.header(ACCEPT, OBJECT_MEDIA_TYPE);
        }
        if let Some(v) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(v.to_string());
        }

        let resp = req.send().await.map_err(|e| StoreError::new(e.to_string()))?;
        let status = resp.status().as_u16();
        let count = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);
        let text = resp.text().await.map_err(|e| StoreError::new(e.to_string()))?;

        if !(200..300).contains(&status) {
            let mut err = serde_json::from_str::<StoreError>(&text).unwrap_or_default();
            if err.message.is_empty() {
                err.message = if text.trim().is_empty() {
                    format!("Request failed with status {}", status)
                } else {
                    text
                };
            }
            if status == 406 && self.row_mode == RowMode::Single && err.code.is_none() {
                err.code = Some(super::NO_ROWS_CODE.to_string());
            }
            return Err(err.with_status(status));
        }

        let mut data = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| StoreError::new(format!("Invalid store response: {}", e)).with_status(status))?
        };

        if self.row_mode == RowMode::MaybeSingle {
            data = match data {
                Value::Array(mut rows) if rows.len() <= 1 => rows.pop().unwrap_or(Value::Null),
                Value::Array(_) => return Err(StoreError::no_rows()),
                other => other,
            };
        }

        Ok(StoreResponse {
            data,
            status,
            status_text: status_text(status),
            count,
        })
    }
}

/// Operand text for scalar filters; strings are used verbatim.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Double-quote list items that contain PostgREST reserved characters.
fn quoted(item: &str) -> String {
    let reserved = |c: char| matches!(c, ',' | '(' | ')' | '"' | ':') || c.is_whitespace();
    if item.contains(reserved) {
        format!("\"{}\"", item.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        item.to_string()
    }
}

/// Array operands become `{a,b}`; objects are sent as JSON; strings verbatim.
fn collection(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|v| quoted(&scalar(v))).collect();
            format!("{{{}}}", items.join(","))
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `0-9/42` → 42; `*/42` → 42; `0-9/*` → none.
fn content_range_total(range: &str) -> Option<u64> {
    range.rsplit('/').next().and_then(|t| t.parse().ok())
}
