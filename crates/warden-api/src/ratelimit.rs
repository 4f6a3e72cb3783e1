//! # Token-Bucket Rate Limiting
//!
//! Named fixed-window buckets, one window per `(limiter, client)` pair.
//! Every request that reaches the rate-limit filter consumes one permit
//! from its limiter's bucket; an exhausted bucket rejects with
//! [`SecurityError::RateLimitExceeded`] carrying the accounting the HTTP
//! layer echoes as `X-Rate-Limit-*` headers. There is no queuing —
//! rejection is immediate, and the `Retry-After` value tells the caller
//! when the window rolls over.
//!
//! The client key is the authenticated subject when a principal is
//! attached, so limits follow the user across addresses; unauthenticated
//! traffic falls back to its forwarded or peer address.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use warden_jose::SecurityError;

use crate::config::LimiterSettings;

/// Upper bound on retained windows before stale ones are swept.
const WINDOW_SWEEP_THRESHOLD: usize = 16_384;

/// The rate-limit filter's per-route decision: which bucket, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterChoice {
    /// The route is exempt from rate limiting.
    Exempt,
    /// Acquire from the named limiter.
    Named(Arc<str>),
}

impl LimiterChoice {
    pub fn named(name: &str) -> Self {
        Self::Named(Arc::from(name))
    }
}

/// A point-in-time view of one bucket, echoed as response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Permits allowed per refresh period.
    pub limit: u64,
    /// Permits still available in the current window.
    pub remaining: u64,
    /// Epoch second at which the current window ends.
    pub reset: i64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: i64,
    used: u64,
}

/// Registry of named fixed-window limiters.
///
/// Limiter definitions are fixed at startup; windows are created lazily
/// per client key and swept once the map grows past a threshold.
pub struct RateLimiter {
    limiters: BTreeMap<String, LimiterSettings>,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new(limiters: BTreeMap<String, LimiterSettings>) -> Self {
        Self {
            limiters,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn settings(&self, name: &str) -> LimiterSettings {
        // Config validation guarantees referenced names exist and that
        // "default" is always defined.
        self.limiters
            .get(name)
            .or_else(|| self.limiters.get("default"))
            .copied()
            .unwrap_or(LimiterSettings {
                limit_for_period: u64::MAX,
                refresh_period_secs: 1,
            })
    }

    /// Try to take one permit from `name`'s bucket for `client`.
    ///
    /// On success the returned status reflects the state *after* the
    /// permit was consumed. On rejection the error carries the same
    /// accounting plus the seconds until the window rolls over.
    pub fn try_acquire(&self, name: &str, client: &str) -> Result<RateLimitStatus, SecurityError> {
        let settings = self.settings(name);
        let period = settings.refresh_period_secs as i64;
        let now = Utc::now().timestamp();
        let window_start = now - now.rem_euclid(period);
        let reset = window_start + period;

        let mut windows = self.windows.lock();
        if windows.len() > WINDOW_SWEEP_THRESHOLD {
            windows.retain(|_, w| w.start + period > now);
        }
        let window = windows
            .entry((name.to_string(), client.to_string()))
            .or_insert(Window {
                start: window_start,
                used: 0,
            });
        if window.start != window_start {
            window.start = window_start;
            window.used = 0;
        }

        if window.used >= settings.limit_for_period {
            return Err(SecurityError::RateLimitExceeded {
                limit: settings.limit_for_period,
                remaining: 0,
                reset,
                retry_after: (reset - now).max(1) as u64,
            });
        }
        window.used += 1;
        Ok(RateLimitStatus {
            limit: settings.limit_for_period,
            remaining: settings.limit_for_period - window.used,
            reset,
        })
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limiters", &self.limiters.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
