//! Canonical error codes carried in [`ApiError::code`](crate::ApiError).
//!
//! Backend codes (for example PostgREST `PGRST…` codes) pass through the layer
//! untouched; the codes below are the ones this crate produces itself.
//!
//! ## Example
//!
//! ```rust
//! use fait_api::error_code::ErrorCode;
//!
//! let code = ErrorCode::from_code("ECONNABORTED").unwrap();
//! assert_eq!(code, ErrorCode::Aborted);
//! assert_eq!(code.category(), "transport");
//! ```

use std::fmt;

/// Error codes produced by the data-access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// ECONNABORTED: the call was cancelled or its timeout elapsed
    Aborted,
    /// ERR_NETWORK: the request never produced an HTTP response
    Network,
    /// ERR_BAD_RESPONSE: the server answered with a non-2xx status
    BadResponse,
    /// ERR_DECODE: the payload could not be decoded into the requested type
    Decode,
    /// ERR_INVALID_REQUEST: malformed request (bad params, unsupported body or method)
    InvalidRequest,
    /// INVALID_FILTER_OPERATOR: a filter used an operator outside the closed set
    InvalidFilterOperator,
    /// ERR_CONFIGURATION: the service was built without a required collaborator
    Configuration,
    /// PGRST116: the store found no row where exactly one was requested
    NoRows,
    /// ERR_UNKNOWN: error could not be classified
    Unknown,
}

impl ErrorCode {
    /// Returns the canonical code string (e.g., `"ECONNABORTED"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Aborted => "ECONNABORTED",
            Self::Network => "ERR_NETWORK",
            Self::BadResponse => "ERR_BAD_RESPONSE",
            Self::Decode => "ERR_DECODE",
            Self::InvalidRequest => "ERR_INVALID_REQUEST",
            Self::InvalidFilterOperator => "INVALID_FILTER_OPERATOR",
            Self::Configuration => "ERR_CONFIGURATION",
            Self::NoRows => "PGRST116",
            Self::Unknown => "ERR_UNKNOWN",
        }
    }

    /// Returns the category: `"transport"`, `"remote"`, `"client"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Aborted | Self::Network => "transport",
            Self::BadResponse | Self::NoRows => "remote",
            Self::Decode
            | Self::InvalidRequest
            | Self::InvalidFilterOperator
            | Self::Configuration => "client",
            Self::Unknown => "unknown",
        }
    }

    /// Programmer errors fail before any I/O happens.
    #[inline]
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest | Self::InvalidFilterOperator | Self::Configuration
        )
    }

    /// Maps a code string back to the enum, if it is one of ours.
    pub fn from_code(code: &str) -> Option<Self> {
        let c = match code {
            "ECONNABORTED" => Self::Aborted,
            "ERR_NETWORK" => Self::Network,
            "ERR_BAD_RESPONSE" => Self::BadResponse,
            "ERR_DECODE" => Self::Decode,
            "ERR_INVALID_REQUEST" => Self::InvalidRequest,
            "INVALID_FILTER_OPERATOR" => Self::InvalidFilterOperator,
            "ERR_CONFIGURATION" => Self::Configuration,
            "PGRST116" => Self::NoRows,
            "ERR_UNKNOWN" => Self::Unknown,
            _ => return None,
        };
        Some(c)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
