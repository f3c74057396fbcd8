// ABOUTME: Injectable clock and random source abstractions
// ABOUTME: System implementations wrap chrono and the ring system RNG
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Time and randomness injection points.
//!
//! Token issuance timestamps and authorization-code keys must be controllable
//! from tests, so the middleware never reaches for `Utc::now()` or the system
//! RNG directly — everything flows through [`Clock`] and [`RandomSource`]
//! handles carried on the server options.

use chrono::{DateTime, Timelike, Utc};
use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::ServerError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cryptographically secure byte source.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` with random bytes.
    ///
    /// # Errors
    /// Returns an error if the underlying generator fails.
    fn fill(&self, dest: &mut [u8]) -> Result<(), ServerError>;
}

/// Random source backed by `ring`'s system RNG.
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn fill(&self, dest: &mut [u8]) -> Result<(), ServerError> {
        self.rng.fill(dest).map_err(|_| ServerError::RandomSource)
    }
}

/// Truncate a timestamp to whole seconds so `exp - iat` stays integral.
#[must_use]
pub fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.with_nanosecond(0).unwrap_or(instant)
}
