//! Transports: where a merged request actually goes.

mod executor;
pub mod http;
pub mod store;

pub use executor::{HttpExecutor, HttpRequest, HttpResponse, ReqwestExecutor, TransportError};
pub use http::{compose_url, HttpTransport};
pub use store::StoreTransport;

pub(crate) use executor::env_parse;

use crate::interceptors::InterceptorSet;
use crate::types::{RawResponse, RequestConfig, TransportKind};
use crate::Result;
use async_trait::async_trait;

/// A full request pipeline for one backend kind: interceptors, cache,
/// deadline, dispatch and error normalization.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn interceptors(&self) -> &InterceptorSet;

    /// URL as it appears in this transport's cache keys.
    fn cache_scope(&self, url: &str) -> String;

    async fn execute(&self, config: RequestConfig) -> Result<RawResponse>;
}
