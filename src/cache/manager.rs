//! Cache manager.

use super::backend::{CacheBackend, CacheLookup, MemoryCache};
use crate::types::RawResponse;
use crate::{ApiError, Result};
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// TTL used when neither the request nor the cache config names one.
pub const FALLBACK_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Option<Duration>,
    pub enabled: bool,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            enabled: true,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub expired: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    expired: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Response cache shared by every transport of a facade.
///
/// All operations are synchronous; nothing here suspends.
pub struct CacheManager {
    config: RwLock<CacheConfig>,
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default(), Box::new(MemoryCache::new()))
    }
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config: RwLock::new(config),
            backend,
            stats: AtomicStats::default(),
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn config(&self) -> CacheConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_config(&self, config: CacheConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Replace the default TTL used by later `set` calls without one.
    pub fn configure(&self, default_ttl: Duration) {
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .default_ttl = Some(default_ttl);
    }

    pub fn default_ttl(&self) -> Duration {
        self.config().default_ttl.unwrap_or(FALLBACK_TTL)
    }

    pub fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    pub fn get(&self, key: &str) -> Option<RawResponse> {
        if !self.is_enabled() {
            return None;
        }
        match self.backend.get(&self.prefix_key(key)) {
            CacheLookup::Hit(value) => {
                AtomicStats::bump(&self.stats.hits, 1);
                Some(value)
            }
            CacheLookup::Expired => {
                AtomicStats::bump(&self.stats.expired, 1);
                AtomicStats::bump(&self.stats.misses, 1);
                None
            }
            CacheLookup::Miss => {
                AtomicStats::bump(&self.stats.misses, 1);
                None
            }
        }
    }

    /// Store `value`; `ttl` of `None` uses [`default_ttl`](Self::default_ttl).
    pub fn set(&self, key: &str, value: RawResponse, ttl: Option<Duration>) {
        if !self.is_enabled() {
            return;
        }
        let ttl = ttl.unwrap_or_else(|| self.default_ttl());
        self.backend.set(self.prefix_key(key), value, ttl);
        AtomicStats::bump(&self.stats.sets, 1);
    }

    pub fn delete(&self, key: &str) -> bool {
        let deleted = self.backend.delete(&self.prefix_key(key));
        if deleted {
            AtomicStats::bump(&self.stats.deletes, 1);
        }
        deleted
    }

    pub fn clear(&self) {
        self.backend.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        let full = self.prefix_key(key);
        self.backend.keys().iter().any(|k| *k == full)
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let full = self.prefix_key(prefix);
        let removed = self.backend.remove_where(&|k: &str| k.starts_with(&full));
        AtomicStats::bump(&self.stats.deletes, removed as u64);
        removed
    }

    /// Remove every entry whose key matches the regular expression `pattern`.
    pub fn invalidate_matching(&self, pattern: &str) -> Result<usize> {
        let re = Regex::new(pattern).map_err(|e| {
            ApiError::configuration(format!("Invalid cache pattern '{}': {}", pattern, e))
        })?;
        let prefix = self.config().key_prefix;
        let removed = self
            .backend
            .remove_where(&|k: &str| re.is_match(strip_prefix(prefix.as_deref(), k)));
        AtomicStats::bump(&self.stats.deletes, removed as u64);
        Ok(removed)
    }

    /// Live keys, without the configured key prefix.
    pub fn keys(&self) -> Vec<String> {
        let prefix = self.config().key_prefix;
        self.backend
            .keys()
            .into_iter()
            .map(|k| strip_prefix(prefix.as_deref(), &k).to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn prefix_key(&self, key: &str) -> String {
        match self.config().key_prefix {
            Some(p) => format!("{}:{}", p, key),
            None => key.to_string(),
        }
    }
}

fn strip_prefix<'a>(prefix: Option<&str>, key: &'a str) -> &'a str {
    prefix
        .and_then(|p| key.strip_prefix(p))
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(key)
}
