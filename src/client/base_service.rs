//! Helper embedded by domain services (invoices, estimates, bookings, ...).

use super::service::ApiService;
use crate::types::RequestConfig;
use crate::{ApiError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

/// Binds an [`ApiService`] to a base path and unwraps responses to their data.
#[derive(Clone)]
pub struct BaseService {
    api: Arc<ApiService>,
    base_path: String,
}

impl BaseService {
    pub fn new(api: Arc<ApiService>, base_path: impl Into<String>) -> Self {
        Self {
            api,
            base_path: base_path.into(),
        }
    }

    pub fn api(&self) -> &Arc<ApiService> {
        &self.api
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `http…` and `/…` paths pass through, an empty path is the base path
    /// itself, and anything else is joined to the base path with duplicate
    /// slashes collapsed.
    pub fn build_url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_path.clone();
        }
        if path.starts_with("http") || path.starts_with('/') || self.base_path.is_empty() {
            return path.to_string();
        }
        collapse_slashes(&format!("{}/{}", self.base_path, path))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
        message: Option<&str>,
    ) -> Result<T> {
        let result = self.api.get(&self.build_url(path), config).await;
        self.unwrap_data(result, message)
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        config: RequestConfig,
        message: Option<&str>,
    ) -> Result<T> {
        let result = self.api.post(&self.build_url(path), body, config).await;
        self.unwrap_data(result, message)
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        config: RequestConfig,
        message: Option<&str>,
    ) -> Result<T> {
        let result = self.api.put(&self.build_url(path), body, config).await;
        self.unwrap_data(result, message)
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        config: RequestConfig,
        message: Option<&str>,
    ) -> Result<T> {
        let result = self.api.patch(&self.build_url(path), body, config).await;
        self.unwrap_data(result, message)
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RequestConfig,
        message: Option<&str>,
    ) -> Result<T> {
        let result = self.api.delete(&self.build_url(path), config).await;
        self.unwrap_data(result, message)
    }

    /// Log once and attach the caller-facing message.
    pub fn handle_error(&self, err: ApiError, message: Option<&str>) -> ApiError {
        error!(
            service = self.base_path.as_str(),
            status = err.status.unwrap_or(0),
            code = err.code.as_deref().unwrap_or(""),
            "{}",
            message.unwrap_or(err.message.as_str())
        );
        match message {
            Some(m) => err.with_message_context(m),
            None => err,
        }
    }

    /// Drop this service's cached reads, e.g. after a write.
    pub fn invalidate_cache(&self) -> usize {
        self.api.invalidate_path(&self.base_path)
    }

    fn unwrap_data<T>(&self, result: Result<crate::ApiResponse<T>>, message: Option<&str>) -> Result<T> {
        result
            .map(|resp| resp.data)
            .map_err(|e| self.handle_error(e, message))
    }
}

/// Collapse runs of `/`, leaving a scheme's `://` alone.
fn collapse_slashes(url: &str) -> String {
    let (scheme, rest) = match url.find("://") {
        Some(i) => url.split_at(i + 3),
        None => ("", url),
    };
    let mut out = String::with_capacity(url.len());
    out.push_str(scheme);
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' && prev_slash {
            continue;
        }
        prev_slash = c == '/';
        out.push(c);
    }
    out
}
