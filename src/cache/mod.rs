//! Time-bounded memoization of path and subgraph results.
//!
//! Keys are a SHA-256 over the canonical JSON of the request shape plus the
//! snapshot version the result was computed against. Entries expire after a
//! fixed TTL and the whole cache is cleared on every graph rebuild.

use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, WarmgraphError};

/// Deterministic hash of a request shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `kind` separates request families that might serialize alike.
    pub fn for_request<T: Serialize>(kind: &str, snapshot_version: u64, request: &T) -> Result<Self> {
        let body = serde_json::to_vec(request)
            .map_err(|e| WarmgraphError::Internal(format!("cache key encoding: {}", e)))?;
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(snapshot_version.to_le_bytes());
        hasher.update(&body);
        let digest = hasher.finalize();
        Ok(CacheKey(digest.iter().map(|b| format!("{:02x}", b)).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct Entry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe TTL + LRU cache of request-scoped results.
///
/// A lookup either returns a complete value or misses; values are inserted
/// whole under the lock and never mutated afterwards.
pub struct ResultCache<V> {
    entries: Mutex<LruCache<CacheKey, Entry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> ResultCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Entry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fresh cached value, if any. Expired entries are dropped on sight.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let mut entries = self.lock();
        let found = entries
            .get(key)
            .map(|entry| (entry.stored_at.elapsed() < self.ttl, Arc::clone(&entry.value)));
        let fresh = match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                entries.pop(key);
                None
            }
            None => None,
        };
        drop(entries);
        match fresh {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Cache hit {}", &key.as_str()[..12]);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.lock().put(
            key,
            Entry {
                value: Arc::clone(&value),
                stored_at: Instant::now(),
            },
        );
        value
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// success. Failures are passed through and never cached.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute().await?;
        Ok(self.put(key, value))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
