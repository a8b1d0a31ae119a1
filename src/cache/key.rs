//! Cache key generation.

use crate::types::HttpMethod;
use serde_json::{Map, Value};
use std::fmt::Write;

/// Canonical cache key: `"{METHOD}:{url}:{canonical params}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Derives keys for idempotent reads.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// `None` for anything but GET: writes are never cached.
    pub fn generate(&self, method: HttpMethod, url: &str, params: &Map<String, Value>) -> Option<CacheKey> {
        if method != HttpMethod::Get {
            return None;
        }
        let mut key = format!("{}:{}:", method, url);
        write_canonical(&Value::Object(params.clone()), &mut key);
        if let Some(ref s) = self.salt {
            key.push('#');
            key.push_str(s);
        }
        Some(CacheKey(key))
    }

    /// Prefix shared by every GET key for `url`, for scoped invalidation.
    pub fn scope(&self, url: &str) -> String {
        format!("{}:{}", HttpMethod::Get, url)
    }
}

/// JSON with object keys sorted at every depth, independent of map ordering.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(k.clone()));
                write_canonical(&map[k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}
