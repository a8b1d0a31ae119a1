//! In-process fakes for the injected capabilities.

use async_trait::async_trait;
use fait_api::store::{QueryBuilder, QueryStore, StoreError, StoreResponse};
use fait_api::transport::{HttpExecutor, HttpRequest, HttpResponse, TransportError};
use fait_api::ApiService;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every builder call as a string, e.g. `eq(status, "sent")`.
#[derive(Clone)]
pub struct RecordingStore {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub executions: Arc<AtomicUsize>,
    reply: Arc<Mutex<Result<StoreResponse, StoreError>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::replying(Ok(StoreResponse::ok(Value::Array(Vec::new()))))
    }

    pub fn replying(reply: Result<StoreResponse, StoreError>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            executions: Arc::new(AtomicUsize::new(0)),
            reply: Arc::new(Mutex::new(reply)),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl QueryStore for RecordingStore {
    fn from(&self, table: &str) -> Box<dyn QueryBuilder> {
        self.calls.lock().unwrap().push(format!("from({})", table));
        Box::new(RecordingQuery {
            store: self.clone(),
        })
    }
}

struct RecordingQuery {
    store: RecordingStore,
}

impl RecordingQuery {
    fn push(&self, call: String) {
        self.store.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl QueryBuilder for RecordingQuery {
    fn select(&mut self, columns: &str) {
        self.push(format!("select({})", columns));
    }
    fn eq(&mut self, field: &str, value: &Value) {
        self.push(format!("eq({}, {})", field, value));
    }
    fn neq(&mut self, field: &str, value: &Value) {
        self.push(format!("neq({}, {})", field, value));
    }
    fn gt(&mut self, field: &str, value: &Value) {
        self.push(format!("gt({}, {})", field, value));
    }
    fn gte(&mut self, field: &str, value: &Value) {
        self.push(format!("gte({}, {})", field, value));
    }
    fn lt(&mut self, field: &str, value: &Value) {
        self.push(format!("lt({}, {})", field, value));
    }
    fn lte(&mut self, field: &str, value: &Value) {
        self.push(format!("lte({}, {})", field, value));
    }
    fn like(&mut self, field: &str, pattern: &str) {
        self.push(format!("like({}, {})", field, pattern));
    }
    fn ilike(&mut self, field: &str, pattern: &str) {
        self.push(format!("ilike({}, {})", field, pattern));
    }
    fn in_(&mut self, field: &str, values: &[Value]) {
        self.push(format!("in({}, {})", field, Value::Array(values.to_vec())));
    }
    fn is(&mut self, field: &str, value: &Value) {
        self.push(format!("is({}, {})", field, value));
    }
    fn contains(&mut self, field: &str, value: &Value) {
        self.push(format!("contains({}, {})", field, value));
    }
    fn overlaps(&mut self, field: &str, value: &Value) {
        self.push(format!("overlaps({}, {})", field, value));
    }
    fn order(&mut self, field: &str, ascending: bool) {
        self.push(format!("order({}, {})", field, ascending));
    }
    fn limit(&mut self, count: u64) {
        self.push(format!("limit({})", count));
    }
    fn range(&mut self, from: u64, to: u64) {
        self.push(format!("range({}, {})", from, to));
    }
    fn single(&mut self) {
        self.push("single()".to_string());
    }
    fn maybe_single(&mut self) {
        self.push("maybe_single()".to_string());
    }
    fn insert(&mut self, values: &Value) {
        self.push(format!("insert({})", values));
    }
    fn upsert(&mut self, values: &Value) {
        self.push(format!("upsert({})", values));
    }
    fn update(&mut self, values: &Value) {
        self.push(format!("update({})", values));
    }
    fn delete(&mut self) {
        self.push("delete()".to_string());
    }

    async fn execute(self: Box<Self>) -> Result<StoreResponse, StoreError> {
        self.store.executions.fetch_add(1, Ordering::SeqCst);
        self.store.reply.lock().unwrap().clone()
    }
}

/// Answers every request with the same JSON body and counts calls.
pub struct CountingExecutor {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
    body: Value,
}

impl CountingExecutor {
    pub fn new(body: Value) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
            body,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpExecutor for CountingExecutor {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(HttpResponse::json(200, &self.body))
    }
}

/// Never produces a response.
pub struct PendingExecutor;

#[async_trait]
impl HttpExecutor for PendingExecutor {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        std::future::pending().await
    }
}

pub fn service_with(executor: Arc<dyn HttpExecutor>, store: RecordingStore) -> ApiService {
    ApiService::builder()
        .base_url("https://api.test")
        .executor(executor)
        .store(Arc::new(store))
        .build()
        .expect("service builds")
}
