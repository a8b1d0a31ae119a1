//! Structured query-store capability.
//!
//! The store transport never talks to a database itself; it translates each
//! request into calls on a [`QueryBuilder`] obtained from an injected
//! [`QueryStore`]. [`PostgrestStore`] is the bundled implementation.

mod postgrest;

pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Backend code for "no rows" on a single-row query.
pub const NO_ROWS_CODE: &str = "PGRST116";

/// Successful result of [`QueryBuilder::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse {
    pub data: Value,
    pub status: u16,
    pub status_text: String,
    /// Total row count, when the backend reports one.
    pub count: Option<u64>,
}

impl StoreResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            status: 200,
            status_text: "OK".to_string(),
            count: None,
        }
    }
}

/// Error reported by the store backend.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(skip)]
    pub status: Option<u16>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn no_rows() -> Self {
        Self::new("JSON object requested, multiple (or no) rows returned")
            .with_code(NO_ROWS_CODE)
            .with_status(406)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_no_rows(&self) -> bool {
        self.code.as_deref() == Some(NO_ROWS_CODE)
    }
}

/// Entry point of the capability: one fresh builder per request.
pub trait QueryStore: Send + Sync {
    fn from(&self, table: &str) -> Box<dyn QueryBuilder>;
}

/// One query under construction. Calls accumulate in order; nothing runs
/// until [`execute`](Self::execute).
#[async_trait]
pub trait QueryBuilder: Send {
    fn select(&mut self, columns: &str);

    fn eq(&mut self, field: &str, value: &Value);
    fn neq(&mut self, field: &str, value: &Value);
    fn gt(&mut self, field: &str, value: &Value);
    fn gte(&mut self, field: &str, value: &Value);
    fn lt(&mut self, field: &str, value: &Value);
    fn lte(&mut self, field: &str, value: &Value);
    fn like(&mut self, field: &str, pattern: &str);
    fn ilike(&mut self, field: &str, pattern: &str);
    fn in_(&mut self, field: &str, values: &[Value]);
    fn is(&mut self, field: &str, value: &Value);
    fn contains(&mut self, field: &str, value: &Value);
    fn overlaps(&mut self, field: &str, value: &Value);

    fn order(&mut self, field: &str, ascending: bool);
    fn limit(&mut self, count: u64);
    /// Inclusive row range.
    fn range(&mut self, from: u64, to: u64);
    fn single(&mut self);
    fn maybe_single(&mut self);

    fn insert(&mut self, values: &Value);
    fn upsert(&mut self, values: &Value);
    fn update(&mut self, values: &Value);
    fn delete(&mut self);

    async fn execute(self: Box<Self>) -> Result<StoreResponse, StoreError>;
}
