//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Router (cache-eligible request)
//!     → CacheKey(account_id, canonical upstream URL)
//!     → ResponseStore::get
//!         hit  → serve stored (already rewritten) body
//!         miss → upstream fetch → rewrite → ResponseStore::put
//!
//! Account switch
//!     → ResponseStore::invalidate(|key| key.account_id == previous)
//!
//! Background
//!     → sweeper.rs (periodic purge of expired entries)
//! ```
//!
//! # Design Decisions
//! - The account id is part of the key, so entries are never shared across accounts
//! - Stores are injected as `Arc<dyn ResponseStore>`; the router never sees a concrete type
//! - Concurrent puts for one key are last-writer-wins
//! - No single-flight: concurrent misses for a cold key each fetch upstream
//! - Store failures degrade to a cache miss at the call site

pub mod memory;
pub mod sweeper;

pub use memory::MemoryStore;
pub use sweeper::spawn_sweeper;

use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Cache key. Two accounts never share an entry for the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub account_id: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(account_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.account_id, self.url)
    }
}

/// A stored, already rewritten response body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: Bytes,
    pub content_type: String,
    pub cached_at: SystemTime,
}

impl CacheEntry {
    pub fn new(body: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            body,
            content_type: content_type.into(),
            cached_at: SystemTime::now(),
        }
    }

    /// True once the entry is older than `ttl`. A clock that moved backwards
    /// counts as fresh.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at
            .elapsed()
            .map(|age| age >= ttl)
            .unwrap_or(false)
    }
}

/// Errors from a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Predicate used for bulk invalidation.
pub type KeyPredicate<'a> = &'a (dyn Fn(&CacheKey) -> bool + Send + Sync);

/// Storage for rewritten upstream responses.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Fetch a live entry. Expired entries are reported as a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite an entry.
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove every entry whose key matches. Returns the number removed.
    async fn invalidate(&self, predicate: KeyPredicate<'_>) -> Result<usize, CacheError>;

    /// Drop expired entries. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, CacheError>;

    /// Remove every entry cached for `account_id`.
    async fn invalidate_account(&self, account_id: &str) -> Result<usize, CacheError> {
        self.invalidate(&|key: &CacheKey| key.account_id == account_id)
            .await
    }
}
