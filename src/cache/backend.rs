//! Cache backend implementations.

use crate::types::RawResponse;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// A cached response and its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: RawResponse,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(value: RawResponse, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Valid iff `now - created_at < ttl`.
    pub fn is_valid(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }
}

/// Outcome of a backend read.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit(RawResponse),
    Miss,
    /// The entry existed but had outlived its TTL; it has been removed.
    Expired,
}

/// Storage behind [`CacheManager`](super::CacheManager).
///
/// Every method is one synchronous step: implementations must not block on
/// I/O, and callers never hold a backend borrow across an `.await`.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> CacheLookup;
    fn set(&self, key: String, value: RawResponse, ttl: Duration);
    fn delete(&self, key: &str) -> bool;
    fn clear(&self);
    /// Remove every entry whose key matches; returns how many were removed.
    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> usize;
    /// Keys of entries that are still valid.
    fn keys(&self) -> Vec<String>;
    fn name(&self) -> &'static str;

    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory map with lazy expiry. No background sweeper.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> CacheLookup {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.is_valid() => CacheLookup::Hit(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                CacheLookup::Expired
            }
            None => CacheLookup::Miss,
        }
    }

    fn set(&self, key: String, value: RawResponse, ttl: Duration) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, CacheEntry::new(value, ttl));
    }

    fn delete(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|k, _| !predicate(k));
        before - entries.len()
    }

    fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_valid())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Stores nothing; every read misses.
#[derive(Debug, Default)]
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

impl CacheBackend for NullCache {
    fn get(&self, _: &str) -> CacheLookup {
        CacheLookup::Miss
    }
    fn set(&self, _: String, _: RawResponse, _: Duration) {}
    fn delete(&self, _: &str) -> bool {
        false
    }
    fn clear(&self) {}
    fn remove_where(&self, _: &dyn Fn(&str) -> bool) -> usize {
        0
    }
    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
