//! Fixed-window request limiter keyed by an arbitrary string.
//!
//! Bounds how often a given sync credential may trigger work. Counters are
//! in-memory only; a process restart resets them, which is acceptable for an
//! abuse-prevention control. A background sweep deletes expired entries to
//! bound memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// Fixed-window counter map. Each key's counter is updated atomically per
/// request; different keys are fully independent.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and record one request for `key`.
    ///
    /// A fresh window starts when no entry exists or the stored window has
    /// elapsed. Within a live window, requests beyond `max_requests` are
    /// rejected with the existing reset time unchanged.
    pub fn check(&self, key: &str, window: Duration, max_requests: u32) -> RateLimitDecision {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");

        match entries.get_mut(key) {
            Some(entry) if entry.window_reset_at > now => {
                if entry.count >= max_requests {
                    counter!("rate_limit_rejected_total").increment(1);
                    return RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: entry.window_reset_at,
                    };
                }
                entry.count += 1;
                RateLimitDecision {
                    allowed: true,
                    remaining: max_requests - entry.count,
                    reset_at: entry.window_reset_at,
                }
            }
            _ => {
                let reset_at = now
                    + chrono::Duration::from_std(window)
                        .unwrap_or_else(|_| chrono::Duration::milliseconds(60_000));
                entries.insert(
                    key.to_string(),
                    RateLimitEntry {
                        count: 1,
                        window_reset_at: reset_at,
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: max_requests.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }

    /// Delete entries whose window has already expired. Returns the number
    /// of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.window_reset_at > now);
        before - entries.len()
    }

    /// Number of live entries (diagnostics only).
    pub fn len(&self) -> usize {
        self.entries.lock().expect("rate limiter mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawn the periodic expiry sweep, running until the shutdown token fires.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting rate limit sweeper");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Rate limit sweeper shutdown requested");
                    break;
                }
                _ = sleep(interval) => {
                    let removed = limiter.sweep();
                    if removed > 0 {
                        debug!(removed, "Swept expired rate limit entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(60_000);

    #[test]
    fn fixed_window_counts_down_then_rejects() {
        let limiter = RateLimiter::new();

        let first = limiter.check("secret-a", WINDOW, 2);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        let second = limiter.check("secret-a", WINDOW, 2);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.check("secret-a", WINDOW, 2);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        // Rejection leaves the original window boundary in place.
        assert_eq!(third.reset_at, first.reset_at);
    }

    #[test]
    fn expired_window_starts_fresh() {
        let limiter = RateLimiter::new();
        let tiny = Duration::from_millis(1);

        let first = limiter.check("secret-b", tiny, 2);
        assert!(first.allowed);
        std::thread::sleep(Duration::from_millis(5));

        let after = limiter.check("secret-b", WINDOW, 2);
        assert!(after.allowed);
        assert_eq!(after.remaining, 1);
        assert!(after.reset_at > first.reset_at);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();

        let exhausted = limiter.check("user-one", WINDOW, 1);
        assert!(exhausted.allowed);
        assert!(!limiter.check("user-one", WINDOW, 1).allowed);

        let other = limiter.check("user-two", WINDOW, 1);
        assert!(other.allowed);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let limiter = RateLimiter::new();
        limiter.check("stale", Duration::from_millis(1), 5);
        limiter.check("live", WINDOW, 5);

        std::thread::sleep(Duration::from_millis(5));
        let removed = limiter.sweep();

        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
    }
}
