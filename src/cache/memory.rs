//! In-process response store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheEntry, CacheError, CacheKey, KeyPredicate, ResponseStore};
use crate::observability::metrics;

/// A thread-safe, TTL-bounded response store backed by `DashMap`.
///
/// Expired entries are removed lazily on lookup and by the periodic sweeper.
#[derive(Debug)]
pub struct MemoryStore {
    inner: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let entry = match self.inner.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        if entry.is_expired(self.ttl) {
            // Only drop it if nobody replaced it in the meantime
            self.inner
                .remove_if(key, |_, current| current.is_expired(self.ttl));
            metrics::record_cache_size(self.inner.len());
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        self.inner.insert(key, entry);
        metrics::record_cache_size(self.inner.len());
        Ok(())
    }

    async fn invalidate(&self, predicate: KeyPredicate<'_>) -> Result<usize, CacheError> {
        let before = self.inner.len();
        self.inner.retain(|key, _| !predicate(key));
        let removed = before.saturating_sub(self.inner.len());
        metrics::record_cache_size(self.inner.len());
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        let before = self.inner.len();
        let ttl = self.ttl;
        self.inner.retain(|_, entry| !entry.is_expired(ttl));
        let removed = before.saturating_sub(self.inner.len());
        metrics::record_cache_size(self.inner.len());
        Ok(removed)
    }
}
