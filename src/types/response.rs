use crate::types::RequestConfig;
use crate::Result;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Untyped response body, as parsed by a transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
    Binary(Bytes),
}

impl Payload {
    /// JSON view of the payload; binary bodies have none.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Json(v) => Some(v.clone()),
            Self::Text(s) => Some(serde_json::Value::String(s.clone())),
            Self::Empty | Self::Binary(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Decode into a caller-chosen type.
    ///
    /// Empty bodies decode as JSON `null` (so `Option<T>` and `()` work);
    /// binary bodies are attempted as JSON bytes.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let decoded = match self {
            Self::Json(v) => T::deserialize(v)?,
            Self::Text(s) => serde_json::from_value(serde_json::Value::String(s.clone()))?,
            Self::Empty => serde_json::from_value(serde_json::Value::Null)?,
            Self::Binary(b) => serde_json::from_slice(b)?,
        };
        Ok(decoded)
    }
}

/// A response delivered to callers.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    /// Echo of the merged request that produced this response.
    pub config: RequestConfig,
    /// True when served from the response cache.
    pub cached: bool,
}

/// The form transports produce and the cache stores.
pub type RawResponse = ApiResponse<Payload>;

impl ApiResponse<Payload> {
    pub fn raw(status: u16, data: Payload, config: RequestConfig) -> Self {
        Self {
            data,
            status,
            status_text: status_text(status),
            headers: BTreeMap::new(),
            config,
            cached: false,
        }
    }

    /// Decode the payload, keeping status/headers/config.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ApiResponse<T>> {
        let data = match self.data.decode() {
            Ok(d) => d,
            Err(e) => {
                return Err(e
                    .with_status(self.status)
                    .with_response((&self).into())
                    .with_config(self.config))
            }
        };
        Ok(ApiResponse {
            data,
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            config: self.config,
            cached: self.cached,
        })
    }
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            config: self.config,
            cached: self.cached,
        }
    }
}

pub(crate) fn status_text(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
        .to_string()
}
