//! # Rate limiting
//!
//! Process-local limiters. Counters live in memory only: a restart resets them
//! and a second instance of the service keeps its own independent view.
//! Running several instances requires replacing these with a shared counter
//! (atomic increment with expiry in a key-value store).

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// How long the visitor throttle remembers a hash.
const VISITOR_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Result of a fixed-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
}

impl RateDecision {
    fn allow(remaining: u32) -> Self {
        Self { allowed: true, remaining }
    }

    fn deny() -> Self {
        Self { allowed: false, remaining: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by client identity.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, identity: &str, max_requests: u32, window: Duration) -> RateDecision {
        self.check_at(identity, max_requests, window, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(
        &self,
        identity: &str,
        max_requests: u32,
        window: Duration,
        now: Instant,
    ) -> RateDecision {
        if max_requests == 0 {
            return RateDecision::deny();
        }

        let fresh = Window { count: 1, reset_at: now + window };
        let (decision, started) = match self.windows.entry(identity.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                (RateDecision::allow(max_requests - 1), true)
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if now > current.reset_at {
                    *current = fresh;
                    (RateDecision::allow(max_requests - 1), true)
                } else if current.count >= max_requests {
                    (RateDecision::deny(), false)
                } else {
                    current.count += 1;
                    (RateDecision::allow(max_requests - current.count), false)
                }
            }
        };

        // The entry guard is dropped above; retain locks every shard.
        if started {
            self.windows.retain(|_, w| now <= w.reset_at);
        }
        decision
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Coarse limiter that blocks any repeat from the same hash within a window.
///
/// Used for low-frequency visitor notifications.
#[derive(Debug, Default)]
pub struct VisitorThrottle {
    last_seen: DashMap<String, Instant>,
}

impl VisitorThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the caller should be turned away.
    pub fn should_limit(&self, hash: &str, window: Duration) -> bool {
        self.should_limit_at(hash, window, Instant::now())
    }

    pub fn should_limit_at(&self, hash: &str, window: Duration, now: Instant) -> bool {
        // Check and record under the same entry guard.
        match self.last_seen.entry(hash.to_owned()) {
            Entry::Occupied(mut slot) => {
                if now.saturating_duration_since(*slot.get()) < window {
                    return true;
                }
                slot.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }

        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) <= VISITOR_RETENTION);
        false
    }

    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }
}
