//! Core rate limiter implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::CounterEntry;
use super::identity::{client_identifier, RequestContext};
use super::key::RateLimitKey;
use super::registry::Registry;
use crate::error::{Result, TurnstileError};

/// Window and capacity settings for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Length of one counting window
    #[serde(rename = "window_ms", with = "millis")]
    pub window: Duration,
    /// Upper bound on distinct action/client pairs tracked at once
    pub max_tracked_keys: usize,
}

impl RateLimiterConfig {
    /// Create a validated configuration.
    pub fn new(window: Duration, max_tracked_keys: usize) -> Result<Self> {
        let config = Self {
            window,
            max_tracked_keys,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject a zero window or a zero capacity.
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(TurnstileError::Config(
                "rate limit window must be greater than zero".to_string(),
            ));
        }
        if self.max_tracked_keys == 0 {
            return Err(TurnstileError::Config(
                "max_tracked_keys must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Outcome of a permitted check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Operations still permitted in the current window
    pub remaining: u32,
    /// Time until the current window rolls over
    pub reset_after: Duration,
}

/// A check was denied because the window's budget is spent.
///
/// Callers map this to a `429 Too Many Requests` (or equivalent) using
/// [`retry_after`](Self::retry_after) as the retry hint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rate limit exceeded for {key}: {limit} per window, retry in {retry_after:?}")]
pub struct RateLimitExceeded {
    /// The key whose budget is spent
    pub key: RateLimitKey,
    /// The limit that was applied
    pub limit: u32,
    /// Time until the current window rolls over
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Retry hint in whole seconds, rounded up, for `Retry-After` headers.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// The fixed-window rate limiter.
///
/// One instance is meant to be built by the application's composition root
/// and shared (e.g. in an `Arc`) with every handler that gates on it. Each
/// check locks the whole registry for its read-modify-write, so concurrent
/// checks on one key never admit more than the limit per window.
pub struct RateLimiter {
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    /// Counters indexed by action/client key
    registry: Mutex<Registry>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock.
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::new())
    }

    /// Create a rate limiter on the given clock.
    pub fn with_clock<C: Clock + 'static>(config: RateLimiterConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_tracked_keys).ok_or_else(|| {
            TurnstileError::Config("max_tracked_keys must be greater than zero".to_string())
        })?;

        Ok(Self {
            config,
            clock: Arc::new(clock),
            registry: Mutex::new(Registry::new(capacity, config.window)),
        })
    }

    /// Check and record one `action` attempt by the client behind `ctx`.
    ///
    /// The client identifier is derived with
    /// [`client_identifier`](super::identity::client_identifier). A `limit`
    /// of zero denies every call.
    pub fn check<R: RequestContext + ?Sized>(
        &self,
        ctx: &R,
        limit: u32,
        action: &str,
    ) -> std::result::Result<Admission, RateLimitExceeded> {
        let client = client_identifier(ctx);
        self.check_client(&client, limit, action)
    }

    /// Check and record one `action` attempt by an already identified client.
    pub fn check_client(
        &self,
        client: &str,
        limit: u32,
        action: &str,
    ) -> std::result::Result<Admission, RateLimitExceeded> {
        let key = RateLimitKey::new(action, client);
        let window = self.config.window;

        let mut registry = self.registry.lock();
        let now = self.clock.now();

        trace!(key = %key, limit = limit, "Checking rate limit");

        let counter = registry.get_or_insert_with(&key, now, || {
            debug!(key = %key, limit = limit, "Creating new rate limit counter");
            CounterEntry::new(limit, now)
        });

        if counter.maybe_reset_window(limit, window, now) {
            trace!(key = %key, "Rate limit window rolled over");
        }

        let reset_after = counter.duration_until_reset(window, now);
        if !counter.try_acquire(now) {
            debug!(
                key = %key,
                limit = limit,
                retry_after_ms = reset_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Err(RateLimitExceeded {
                key,
                limit,
                retry_after: reset_after,
            });
        }

        Ok(Admission {
            remaining: counter.remaining(),
            reset_after,
        })
    }

    /// Get the remaining budget for a client and action.
    ///
    /// Returns `None` if no live counter exists for the pair.
    pub fn remaining(&self, client: &str, action: &str) -> Option<u32> {
        let key = RateLimitKey::new(action, client);
        let registry = self.registry.lock();
        let now = self.clock.now();
        registry.peek(&key, now).and_then(|counter| {
            if now.saturating_sub(counter.window_start()) >= self.config.window {
                None
            } else {
                Some(counter.remaining())
            }
        })
    }

    /// Get the number of tracked counters.
    pub fn tracked_keys(&self) -> usize {
        self.registry.lock().len()
    }

    /// Get the maximum number of tracked counters.
    pub fn capacity(&self) -> usize {
        self.config.max_tracked_keys
    }

    /// Get the window length.
    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.registry.lock().clear();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}
