use crate::error_code::ErrorCode;
use crate::types::{Payload, RawResponse, RequestConfig};
use std::collections::BTreeMap;
use thiserror::Error;

const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Snapshot of the response that accompanied a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub data: Payload,
}

impl From<&RawResponse> for ResponseSnapshot {
    fn from(resp: &RawResponse) -> Self {
        Self {
            status: resp.status,
            status_text: resp.status_text.clone(),
            headers: resp.headers.clone(),
            data: resp.data.clone(),
        }
    }
}

/// The single error shape returned across the data-access layer.
///
/// Both transports normalize every failure (network, cancellation, HTTP status,
/// store errors, programmer errors) into this value before it leaves them.
/// `message` is never empty.
#[derive(Debug, Clone, Error)]
#[error("{message}{}", format_context(.status, .code))]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    /// Error code: one of [`ErrorCode`] or a backend code passed through verbatim.
    pub code: Option<String>,
    pub details: Option<serde_json::Value>,
    /// Echo of the (merged) request that failed.
    pub config: Option<Box<RequestConfig>>,
    pub response: Option<Box<ResponseSnapshot>>,
}

fn format_context(status: &Option<u16>, code: &Option<String>) -> String {
    let mut parts = Vec::new();
    if let Some(s) = status {
        parts.push(format!("status: {}", s));
    }
    if let Some(c) = code {
        parts.push(format!("code: {}", c));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        };
        Self {
            message,
            status: None,
            code: None,
            details: None,
            config: None,
            response: None,
        }
    }

    /// Cancellation or timeout.
    pub fn aborted() -> Self {
        Self::new("Request was aborted").with_code(ErrorCode::Aborted)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::Network)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::InvalidRequest)
    }

    pub fn invalid_operator(operator: &str) -> Self {
        Self::new(format!("Unknown filter operator: {}", operator))
            .with_code(ErrorCode::InvalidFilterOperator)
            .with_details(serde_json::json!({ "operator": operator }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::Configuration)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(message).with_code(ErrorCode::Decode)
    }

    /// Non-2xx HTTP response. The parsed body becomes `details`; a string
    /// `message` or `error` field in the body becomes the error message.
    pub fn from_status(response: &RawResponse) -> Self {
        let body = response.data.to_json();
        let message = body
            .as_ref()
            .and_then(body_message)
            .unwrap_or_else(|| format!("Request failed with status {}", response.status));
        let mut err = Self::new(message)
            .with_status(response.status)
            .with_code(ErrorCode::BadResponse)
            .with_response(ResponseSnapshot::from(response));
        err.details = body;
        err
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<ErrorCodeValue>) -> Self {
        self.code = Some(code.into().0);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = Some(Box::new(config));
        self
    }

    pub fn with_response(mut self, response: ResponseSnapshot) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// Echo the config only when none is attached yet.
    pub(crate) fn or_config(mut self, config: &RequestConfig) -> Self {
        if self.config.is_none() {
            self.config = Some(Box::new(config.clone()));
        }
        self
    }

    /// Replace the message with a caller-facing one, keeping the original as `cause`.
    pub fn with_message_context(mut self, message: &str) -> Self {
        if message.trim().is_empty() || message == self.message {
            return self;
        }
        let cause = std::mem::replace(&mut self.message, message.to_string());
        match self.details {
            Some(serde_json::Value::Object(ref mut map)) => {
                map.entry("cause")
                    .or_insert(serde_json::Value::String(cause));
            }
            None => self.details = Some(serde_json::json!({ "cause": cause })),
            Some(_) => {}
        }
        self
    }

    pub fn standard_code(&self) -> Option<ErrorCode> {
        self.code.as_deref().and_then(ErrorCode::from_code)
    }

    pub fn is_aborted(&self) -> bool {
        self.standard_code() == Some(ErrorCode::Aborted)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

fn body_message(body: &serde_json::Value) -> Option<String> {
    ["message", "error"].iter().find_map(|k| {
        body.get(*k)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

/// Either a crate [`ErrorCode`] or a backend code string.
pub struct ErrorCodeValue(String);

impl From<ErrorCode> for ErrorCodeValue {
    fn from(c: ErrorCode) -> Self {
        Self(c.code().to_string())
    }
}

impl From<&str> for ErrorCodeValue {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ErrorCodeValue {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::decode(format!("Failed to decode payload: {}", e))
    }
}
