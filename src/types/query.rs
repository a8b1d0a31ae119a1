//! Filter / sort / pagination sub-structures carried in `RequestConfig::params`.
//!
//! These are parsed out of the free-form params map by [`QuerySpec::from_params`]
//! before the query-store transport issues any builder call, so a malformed
//! filter fails the request up front instead of producing a partial query.

use crate::{ApiError, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Closed set of filter operators understood by the query-store transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Is,
    Contains,
    Overlaps,
    /// Translated to `like("value%")`.
    StartsWith,
    /// Translated to `like("%value")`.
    EndsWith,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::In => "in",
            Self::Is => "is",
            Self::Contains => "contains",
            Self::Overlaps => "overlaps",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "ilike" => Self::Ilike,
            "in" => Self::In,
            "is" => Self::Is,
            "contains" => Self::Contains,
            "overlaps" => Self::Overlaps,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            other => return Err(ApiError::invalid_operator(other)),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterParam {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

impl FilterParam {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "field": self.field,
            "operator": self.operator.as_str(),
            "value": self.value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_ascending(&self) -> bool {
        matches!(self, Self::Asc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortParam {
    pub field: String,
    pub direction: SortDirection,
}

impl SortParam {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn to_value(&self) -> Value {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        json!({ "field": self.field, "direction": dir })
    }
}

/// Either `(limit, offset)` or `(page, limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
}

impl Pagination {
    pub fn limit_offset(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            page: None,
        }
    }

    /// Pages are 1-based.
    pub fn page(page: u64, limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
            page: Some(page),
        }
    }

    /// Explicit offset wins; otherwise `(page - 1) * limit`.
    pub fn effective_offset(&self) -> Option<u64> {
        if self.offset.is_some() {
            return self.offset;
        }
        match (self.page, self.limit) {
            (Some(page), Some(limit)) => Some(page.saturating_sub(1).saturating_mul(limit)),
            _ => None,
        }
    }

    /// Inclusive row range, when both a limit and an offset are known.
    /// `None` when the last row index does not fit in a `u64`.
    pub fn range(&self) -> Option<(u64, u64)> {
        let limit = self.limit.filter(|l| *l > 0)?;
        let from = self.effective_offset()?;
        Some((from, from.checked_add(limit - 1)?))
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(l) = self.limit {
            map.insert("limit".into(), l.into());
        }
        if let Some(o) = self.offset {
            map.insert("offset".into(), o.into());
        }
        if let Some(p) = self.page {
            map.insert("page".into(), p.into());
        }
        Value::Object(map)
    }
}

/// Single-row modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowMode {
    #[default]
    Many,
    /// Exactly one row; zero rows is a not-found error.
    Single,
    /// Zero or one row; zero rows yields `null`.
    MaybeSingle,
}

/// The query-shaped part of a request, parsed from its params.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub select: Option<String>,
    pub filters: Vec<FilterParam>,
    pub sort: Vec<SortParam>,
    pub pagination: Option<Pagination>,
    pub row_mode: RowMode,
}

#[derive(Deserialize)]
struct RawFilter {
    field: String,
    operator: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct RawSort {
    field: String,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    ascending: Option<bool>,
}

impl QuerySpec {
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let select = match params.get("select") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(cols)) => Some(
                cols.iter()
                    .map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string()))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Some(other) => {
                return Err(ApiError::invalid_request(format!(
                    "`select` must be a string or an array of columns, got {}",
                    other
                )))
            }
        };

        let filters = match params.get("filters") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(parse_filter)
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(ApiError::invalid_request("`filters` must be an array")),
        };

        let sort = match params.get("sort") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(parse_sort).collect::<Result<Vec<_>>>()?,
            Some(single @ Value::Object(_)) => vec![parse_sort(single)?],
            Some(_) => return Err(ApiError::invalid_request("`sort` must be an object or an array")),
        };

        let pagination = match params.get("pagination") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let p: Pagination = serde_json::from_value(v.clone()).map_err(|e| {
                    ApiError::invalid_request(format!("Invalid `pagination`: {}", e))
                })?;
                if p.limit.is_none() && (p.offset.is_some() || p.page.is_some()) {
                    return Err(ApiError::invalid_request(
                        "`pagination` with an offset or page also needs a limit",
                    ));
                }
                if p.limit == Some(0) {
                    return Err(ApiError::invalid_request("`pagination.limit` must be at least 1"));
                }
                if (p.offset.is_some() || p.page.is_some()) && p.range().is_none() {
                    return Err(ApiError::invalid_request(
                        "`pagination` row range is out of bounds",
                    ));
                }
                Some(p)
            }
        };

        let flag = |key: &str| params.get(key).and_then(Value::as_bool).unwrap_or(false);
        let row_mode = if flag("single") {
            RowMode::Single
        } else if flag("maybeSingle") {
            RowMode::MaybeSingle
        } else {
            RowMode::Many
        };

        Ok(Self {
            select,
            filters,
            sort,
            pagination,
            row_mode,
        })
    }
}

fn parse_filter(v: &Value) -> Result<FilterParam> {
    let raw: RawFilter = serde_json::from_value(v.clone())
        .map_err(|e| ApiError::invalid_request(format!("Invalid filter {}: {}", v, e)))?;
    Ok(FilterParam {
        field: raw.field,
        operator: raw.operator.parse()?,
        value: raw.value,
    })
}

fn parse_sort(v: &Value) -> Result<SortParam> {
    let raw: RawSort = serde_json::from_value(v.clone())
        .map_err(|e| ApiError::invalid_request(format!("Invalid sort {}: {}", v, e)))?;
    let direction = match (raw.direction.as_deref(), raw.ascending) {
        (Some("asc") | Some("ascending"), _) => SortDirection::Asc,
        (Some("desc") | Some("descending"), _) => SortDirection::Desc,
        (Some(other), _) => {
            return Err(ApiError::invalid_request(format!(
                "Invalid sort direction: {}",
                other
            )))
        }
        (None, Some(false)) => SortDirection::Desc,
        (None, _) => SortDirection::Asc,
    };
    Ok(SortParam {
        field: raw.field,
        direction,
    })
}
