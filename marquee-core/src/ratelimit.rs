//! Fixed-window rate limiting for brute-force-sensitive operations
//!
//! Counters are keyed by `(operation kind, identifier)`, typically the
//! operation name and a client IP. Each window starts on the first recorded
//! attempt and runs for the configured duration; attempts inside a live
//! window increment the count without moving the expiry. A burst straddling
//! a window boundary can briefly exceed the average rate; that trade-off is
//! accepted for a throttle.
//!
//! The counter map lives behind the [`RateLimitStore`] trait so tests can
//! reset it deterministically and multi-process deployments can swap in a
//! shared backing store without touching call sites. The default
//! [`InMemoryRateLimitStore`] carries no persistence guarantee across
//! restarts, which is acceptable for a throttle but not an audit trail.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Limits for one operation kind.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Attempts permitted within a single window.
    pub max_attempts: u32,
    /// Length of the fixed window.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_attempts: u32, window_minutes: i64) -> Self {
        Self {
            max_attempts,
            window: Duration::minutes(window_minutes),
        }
    }
}

/// Outcome of a rate-limit check.
///
/// `retry_after` is present only when the check is denied, and holds the
/// expiry of the active window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after: Option<DateTime<Utc>>,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn denied(retry_after: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// One live counting window for a `(kind, identifier)` key.
#[derive(Debug, Clone)]
pub struct AttemptWindow {
    pub count: u32,
    pub expires_at: DateTime<Utc>,
}

/// Backing store for rate-limit counters.
///
/// Implementations must be safe under concurrent access; slight raciness
/// between a `get` and the following `put` is acceptable for a throttle.
pub trait RateLimitStore: Send + Sync + 'static {
    fn get(&self, kind: &str, identifier: &str) -> Option<AttemptWindow>;
    fn put(&self, kind: &str, identifier: &str, window: AttemptWindow);
    fn remove(&self, kind: &str, identifier: &str);
}

/// Process-local counter store backed by a concurrent map.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<(String, String), AttemptWindow>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, kind: &str, identifier: &str) -> Option<AttemptWindow> {
        self.windows
            .get(&(kind.to_string(), identifier.to_string()))
            .map(|w| w.clone())
    }

    fn put(&self, kind: &str, identifier: &str, window: AttemptWindow) {
        self.windows
            .insert((kind.to_string(), identifier.to_string()), window);
    }

    fn remove(&self, kind: &str, identifier: &str) {
        self.windows
            .remove(&(kind.to_string(), identifier.to_string()));
    }
}

/// Fixed-window rate limiter over a [`RateLimitStore`].
///
/// Counters for different operation kinds never interact, even for the same
/// identifier. An empty-string identifier is an ordinary (if degenerate) key.
pub struct RateLimiter<S: RateLimitStore = InMemoryRateLimitStore> {
    store: S,
}

impl RateLimiter<InMemoryRateLimitStore> {
    /// Create a limiter over the default in-memory store.
    pub fn in_memory() -> Self {
        Self::new(InMemoryRateLimitStore::new())
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record one attempt for the key.
    ///
    /// Starts a fresh window when none is active (or the previous one
    /// expired); otherwise increments in place. The expiry is never moved by
    /// in-window attempts.
    pub fn record_attempt(&self, kind: &str, identifier: &str, config: &RateLimitConfig) {
        self.record_attempt_at(kind, identifier, config, Utc::now());
    }

    /// Check whether another attempt is currently allowed for the key.
    pub fn check(&self, kind: &str, identifier: &str, config: &RateLimitConfig) -> RateLimitDecision {
        self.check_at(kind, identifier, config, Utc::now())
    }

    /// Clear the counter for the key immediately.
    ///
    /// Called after a successful login so a user who mistyped a password a
    /// few times is not punished.
    pub fn reset(&self, kind: &str, identifier: &str) {
        self.store.remove(kind, identifier);
    }

    fn record_attempt_at(
        &self,
        kind: &str,
        identifier: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) {
        let window = match self.store.get(kind, identifier) {
            Some(w) if w.expires_at > now => AttemptWindow {
                count: w.count + 1,
                expires_at: w.expires_at,
            },
            _ => AttemptWindow {
                count: 1,
                expires_at: now + config.window,
            },
        };
        self.store.put(kind, identifier, window);
    }

    fn check_at(
        &self,
        kind: &str,
        identifier: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        match self.store.get(kind, identifier) {
            Some(w) if w.expires_at > now => {
                if w.count >= config.max_attempts {
                    RateLimitDecision::denied(w.expires_at)
                } else {
                    RateLimitDecision::allowed()
                }
            }
            // No window, or the window has expired: a fresh window starts on
            // the next recorded attempt.
            _ => RateLimitDecision::allowed(),
        }
    }
}
