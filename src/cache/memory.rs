// ABOUTME: In-memory authorization-code cache with LRU eviction and TTL expiry
// ABOUTME: Single write-lock take() gives the atomic one-shot redemption guarantee
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::RwLock;

use super::CodeCache;
use crate::errors::ServerError;

/// Cache entry with expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory code cache with LRU eviction.
///
/// Expired entries are dropped lazily on `take`; the LRU bound keeps the store
/// from growing without a background sweeper. `take` holds the write lock for
/// the whole pop-and-check, which is what makes redemption one-shot.
#[derive(Clone)]
pub struct InMemoryCodeCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
}

impl InMemoryCodeCache {
    /// Default capacity when none is given.
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10_000) {
        Some(n) => n,
        None => unreachable!(),
    };

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }
}

impl Default for InMemoryCodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CodeCache for InMemoryCodeCache {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), ServerError> {
        let entry = CacheEntry::new(value.to_vec(), ttl);
        self.store.write().await.push(key.to_owned(), entry);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, ServerError> {
        let mut store = self.store.write().await;
        match store.pop(key) {
            Some(entry) if entry.is_expired() => {
                tracing::debug!("dropping expired cache entry on take");
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), ServerError> {
        self.store.write().await.pop(key);
        Ok(())
    }
}
