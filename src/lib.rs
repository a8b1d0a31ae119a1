//! # fait-api
//!
//! Unified data-access layer: one request type, one response type and one
//! error type in front of two backends.
//!
//! ## Overview
//!
//! Domain services build a [`RequestConfig`] and hand it to an [`ApiService`].
//! The facade merges its defaults under the call, then routes it to either
//!
//! - the generic HTTP transport ([`transport::HttpTransport`]), or
//! - the structured query-store transport ([`transport::StoreTransport`]),
//!   which translates params into filter/sort/pagination builder calls.
//!
//! Both transports share one pipeline ([`client::BaseClient`]): request
//! interceptors, a TTL cache for GET reads, timeout and cancellation, response
//! interceptors, and error interceptors over a normalized [`ApiError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fait_api::{ApiService, RequestConfig};
//! use serde_json::Value;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> fait_api::Result<()> {
//!     let api = ApiService::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(Duration::from_secs(10))
//!         .build()?;
//!
//!     let invoices = api
//!         .get::<Vec<Value>>("/invoices", RequestConfig::default().with_param("status", "sent"))
//!         .await?;
//!     println!("{} invoices (cached: {})", invoices.data.len(), invoices.cached);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Facade, builder, shared pipeline, domain-service helper |
//! | [`transport`] | HTTP and query-store transports, network executor |
//! | [`store`] | Query-store capability and the PostgREST implementation |
//! | [`cache`] | TTL response cache |
//! | [`interceptors`] | Request/response/error interceptor chains |
//! | [`types`] | Request, response and query value types |
//! | [`resilience`] | Retry and circuit-breaker policy carriers |

pub mod cache;
pub mod client;
pub mod error;
pub mod error_code;
pub mod interceptors;
pub mod resilience;
pub mod store;
pub mod transport;
pub mod types;

pub use client::{ApiService, ApiServiceBuilder, BaseService};
pub use error::{ApiError, ResponseSnapshot};
pub use error_code::ErrorCode;
pub use interceptors::{async_interceptor, interceptor_fn, Interceptor, InterceptorHandle};
pub use types::{
    ApiResponse, CachePolicy, FilterOperator, FilterParam, HttpMethod, Pagination, Payload, RawResponse,
    RequestBody, RequestConfig, SortParam, TransportKind,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, ApiError>;
