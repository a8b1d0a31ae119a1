//! Request/response/query value types shared by every component.

pub mod query;
pub mod request;
pub mod response;

pub use query::{FilterOperator, FilterParam, Pagination, QuerySpec, RowMode, SortDirection, SortParam};
pub use request::{CachePolicy, HttpMethod, RequestBody, RequestConfig, TransportKind, CLIENT_HEADER};
pub use response::{ApiResponse, Payload, RawResponse};
