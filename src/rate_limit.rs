//! Per-client sliding-window rate limiting.
//!
//! Every client key owns the list of timestamps (epoch milliseconds) of its
//! admitted requests. A check discards the timestamps that have left the
//! window, compares what is left against the policy maximum, and either
//! records the new request or reports when the client may retry.
//!
//! Eviction is lazy: stale timestamps are only dropped when their key is
//! checked. Keys whose whole history has expired are reclaimed by
//! [`SlidingWindowStore::sweep`], which the server runs from a background
//! task (see [`crate::server::spawn_sweeper`]).

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Default window length: 15 minutes.
pub const DEFAULT_WINDOW_MS: u64 = 15 * 60 * 1000;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 50;

/// A `(window, max)` policy: at most `max` requests per `window_ms`
/// milliseconds for any one client key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Length of the sliding window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Maximum requests admitted within any window.
    #[serde(default = "default_max_requests")]
    pub max: u32,
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max: default_max_requests(),
        }
    }
}

impl RateLimitConfig {
    /// Creates a policy admitting `max` requests per `window_ms`.
    pub fn new(window_ms: u64, max: u32) -> Self {
        Self { window_ms, max }
    }

    fn window(&self) -> i64 {
        i64::try_from(self.window_ms).unwrap_or(i64::MAX)
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request was admitted and recorded.
    pub success: bool,
    /// Requests still available in the current window. Always `0` on rejection.
    pub remaining: u32,
    /// Epoch milliseconds at which the oldest live request leaves the window.
    pub reset_time: i64,
    /// Whole seconds to wait before retrying, rounded up. `Some` only on rejection.
    pub retry_after: Option<u64>,
}

/// Keyed request history shared by every request handler.
///
/// Each check runs while holding the entry guard for its key, so the
/// read-evict-decide-write sequence is atomic per key: concurrent checks for
/// one client are serialized and never admit more than `max` requests.
#[derive(Debug, Default)]
pub struct SlidingWindowStore {
    history: DashMap<String, Vec<i64>>,
}

impl SlidingWindowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the client identified by `key` may make a request at
    /// `now` under `config`, recording the request if it is admitted.
    ///
    /// Timestamps at or before `now - window_ms` are discarded from the
    /// stored history whether or not the request is admitted.
    pub fn check(&self, key: &str, now: i64, config: &RateLimitConfig) -> RateLimitResult {
        let window = config.window();
        let window_start = now.saturating_sub(window);
        let max = config.max as usize;

        match self.history.entry(key.to_owned()) {
            Entry::Occupied(mut entry) => {
                let recent = entry.get_mut();
                recent.retain(|&t| t > window_start);

                if recent.len() >= max {
                    let reset_time = recent.first().map_or(now, |&t| t.saturating_add(window));
                    let retry_after = retry_after_secs(reset_time, now);
                    return RateLimitResult {
                        success: false,
                        remaining: 0,
                        reset_time,
                        retry_after: Some(retry_after),
                    };
                }

                recent.push(now);
                admitted(recent, config)
            }
            Entry::Vacant(entry) => {
                if max == 0 {
                    entry.insert(Vec::new());
                    return RateLimitResult {
                        success: false,
                        remaining: 0,
                        reset_time: now,
                        retry_after: Some(0),
                    };
                }
                let recent = entry.insert(vec![now]);
                admitted(recent.value(), config)
            }
        }
    }

    /// Removes every key whose newest timestamp is at or before
    /// `now - window_ms`. Returns the number of keys removed.
    ///
    /// `window_ms` should be the longest window of any policy checked
    /// against this store, otherwise live history may be discarded.
    pub fn sweep(&self, now: i64, window_ms: u64) -> usize {
        let window_start = now.saturating_sub(i64::try_from(window_ms).unwrap_or(i64::MAX));
        let before = self.history.len();
        self.history
            .retain(|_, stamps| stamps.last().is_some_and(|&t| t > window_start));
        before.saturating_sub(self.history.len())
    }

    /// Returns the number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.history.len()
    }

    /// Returns how many timestamps are stored for `key`, including any not
    /// yet evicted.
    pub fn recorded(&self, key: &str) -> usize {
        self.history.get(key).map_or(0, |stamps| stamps.len())
    }
}

fn admitted(recent: &[i64], config: &RateLimitConfig) -> RateLimitResult {
    let used = u32::try_from(recent.len()).unwrap_or(u32::MAX);
    let reset_time = recent
        .first()
        .map_or(0, |&t| t.saturating_add(config.window()));
    RateLimitResult {
        success: true,
        remaining: config.max.saturating_sub(used),
        reset_time,
        retry_after: None,
    }
}

fn retry_after_secs(reset_time: i64, now: i64) -> u64 {
    let wait_ms = reset_time.saturating_sub(now).max(0) as u64;
    wait_ms.div_ceil(1000)
}
