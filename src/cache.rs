//! Cache collaborator interface.
//!
//! The resolvers treat the cache as an injected dependency rather than a
//! process-wide singleton, so they can be exercised against an in-memory
//! fake. The interface is the usual get/set/delete-by-key-with-TTL triple;
//! caching is a performance optimization, not a correctness requirement, so
//! every call site logs and swallows a backend failure instead of
//! propagating it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A cache backend failure. Never surfaced to end users.
#[derive(Debug, Error)]
#[error("cache backend error: {0}")]
pub struct CacheError(pub String);

/// Shared cache store reachable by every request handler.
///
/// Values are JSON documents. Concurrent population of a cold key by two
/// racing requests is tolerated: last writer wins, and the only cost is a
/// benign duplicate fetch. No distributed locking is assumed.
pub trait Cache: Send + Sync {
    /// Fetch a value, or `None` when the key is absent or expired.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    /// Store a value under `key` for `ttl`.
    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;
    /// Drop a key. Absent keys are not an error.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process cache used by the default deployment and by tests.
///
/// Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("poisoned lock".to_string()))?;
        match entries.get(key) {
            Some((deadline, value)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("poisoned lock".to_string()))?;
        entries.insert(key.to_string(), (Instant::now() + ttl, value.clone()));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError("poisoned lock".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache
            .set("k", &json!({"v": 1}), Duration::from_secs(60))
            .unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(json!({"v": 1})));
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let cache = MemoryCache::new();
        cache.set("k", &json!(1), Duration::from_secs(0)).unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_delete_removes_key() {
        let cache = MemoryCache::new();
        cache.set("k", &json!(1), Duration::from_secs(60)).unwrap();
        cache.delete("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = MemoryCache::new();
        cache.set("k", &json!(1), Duration::from_secs(60)).unwrap();
        cache.set("k", &json!(2), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_missing_key() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("absent").unwrap(), None);
    }
}
