use std::sync::Arc;
use std::time::Duration;

use crate::config::LimiterConfig;
use crate::error::ApiError;
use crate::key_generator::KeyGenerator;
use crate::store::CounterStore;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject { limit: u64, retry_after_secs: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Fixed-window request counter per client.
///
/// Every admitted request increments `rate-limiter:{client}`. Once the count
/// passes `max_requests` the key gets a TTL of `window`, set by the first
/// rejection only, and the count starts over when the key expires.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    enabled: bool,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &LimiterConfig) -> Self {
        Self {
            store,
            enabled: config.enabled,
            max_requests: config.max_requests,
            window: config.request_time_limit.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count one request from `client_id` and decide whether it may pass.
    pub async fn admit(&self, client_id: &str) -> Result<Decision, ApiError> {
        if !self.enabled {
            return Ok(Decision::Allow);
        }

        let key = KeyGenerator::generate_key(client_id);
        let counter = self.store.incr(&key).await?;

        if counter <= self.max_requests {
            return Ok(Decision::Allow);
        }

        if self.store.expire_if_unset(&key, self.window).await? {
            tracing::debug!(
                key = %key,
                window_secs = self.window.as_secs(),
                "Rate limit window closed"
            );
        }

        Ok(Decision::Reject {
            limit: self.max_requests,
            retry_after_secs: self.window.as_secs(),
        })
    }
}
