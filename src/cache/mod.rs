// ABOUTME: Authorization-code cache abstraction with atomic one-shot redemption
// ABOUTME: Pluggable backend trait plus the bundled in-memory implementation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Authorization-Code Cache
//!
//! Authorization codes are random keys pointing at protected ticket payloads
//! stored in this cache until they expire or are redeemed. One-shot semantics
//! hinge on [`CodeCache::take`] being atomic: at most one caller observes the
//! payload, every later call gets `None`. Distributed backends that cannot
//! provide an atomic get-and-delete weaken replay protection and must document
//! it.

pub mod memory;

pub use memory::InMemoryCodeCache;

use std::time::Duration;

use crate::errors::ServerError;

/// Key→value TTL store backing authorization-code persistence.
#[async_trait::async_trait]
pub trait CodeCache: Send + Sync {
    /// Store a payload under `key` for at most `ttl`.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the write.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), ServerError>;

    /// Atomically fetch and remove the payload under `key`.
    ///
    /// Returns `None` for unknown or expired keys. At most one concurrent
    /// caller receives the payload.
    ///
    /// # Errors
    /// Returns an error if the backend lookup fails.
    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, ServerError>;

    /// Remove the payload under `key` without returning it.
    ///
    /// # Errors
    /// Returns an error if the backend removal fails.
    async fn remove(&self, key: &str) -> Result<(), ServerError>;
}
