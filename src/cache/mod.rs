//! # Response Caching Module
//!
//! TTL cache for idempotent reads, shared by both transports of an
//! [`ApiService`](crate::ApiService).
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | Front door: TTL defaults, prefix/pattern invalidation, statistics |
//! | [`CacheConfig`] | Default TTL, on/off switch, key prefix |
//! | [`CacheBackend`] | Trait for custom storage |
//! | [`MemoryCache`] | In-memory map with lazy expiry |
//! | [`NullCache`] | Stores nothing |
//! | [`CacheKeyGenerator`] | `METHOD:url:params` keys with canonical param ordering |
//!
//! ## Example
//!
//! ```rust
//! use fait_api::cache::{CacheConfig, CacheManager, MemoryCache};
//! use std::time::Duration;
//!
//! let cache = CacheManager::new(
//!     CacheConfig::new().with_ttl(Duration::from_secs(30)),
//!     Box::new(MemoryCache::new()),
//! );
//! assert_eq!(cache.default_ttl(), Duration::from_secs(30));
//! ```
//!
//! Entries are checked on read: an expired entry is removed and reported as
//! absent. There is no background sweeper.

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, CacheEntry, CacheLookup, MemoryCache, NullCache};
pub use key::{canonical_json, CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, CacheManager, CacheStats, FALLBACK_TTL};
