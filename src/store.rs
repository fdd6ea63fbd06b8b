//! Shared counter store used by the rate limiter.
//!
//! The store owns atomicity: callers only ever use `incr`, never a
//! read-then-write sequence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ApiError;

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key`, creating it at 1 when absent.
    async fn incr(&self, key: &str) -> Result<u64, ApiError>;

    /// Set a time-to-live on `key` unless it already carries one.
    /// Returns whether a new expiry was set.
    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, ApiError>;

    async fn exists(&self, key: &str) -> Result<bool, ApiError>;

    /// Lightweight connectivity check.
    async fn ping(&self) -> Result<(), ApiError>;
}

#[derive(Debug)]
struct Counter {
    value: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local counter store. Expiry follows the tokio clock, so tests
/// can drive windows with `tokio::time::advance`.
#[derive(Debug)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    available: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going offline (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::StoreUnavailable(
                "Connection refused (simulated)".to_string(),
            ))
        }
    }

    fn with_counters<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Counter>, Instant) -> T,
    ) -> Result<T, ApiError> {
        self.check_available()?;
        let now = Instant::now();
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| ApiError::Internal("Failed to acquire counter lock".to_string()))?;
        counters.retain(|_, counter| !counter.is_expired(now));
        Ok(f(&mut counters, now))
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<u64, ApiError> {
        self.with_counters(|counters, _| {
            let counter = counters.entry(key.to_string()).or_insert(Counter {
                value: 0,
                expires_at: None,
            });
            counter.value += 1;
            counter.value
        })
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, ApiError> {
        self.with_counters(|counters, now| match counters.get_mut(key) {
            Some(counter) if counter.expires_at.is_none() => {
                counter.expires_at = Some(now + ttl);
                true
            }
            _ => false,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        self.with_counters(|counters, _| counters.contains_key(key))
    }

    async fn ping(&self) -> Result<(), ApiError> {
        self.check_available()
    }
}
