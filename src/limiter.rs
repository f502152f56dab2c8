//! The per-request admission step run in front of every handler.

use std::sync::Arc;

use hyper::header::HeaderMap;

use crate::{headers, Clock, PolicySet, RateLimitResult, Result, Route, SlidingWindowStore};

/// What the gateway should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Pass the request through without quota headers. Returned for excluded
    /// paths and whenever the decision itself could not be computed.
    Bypass,
    /// Forward the request and report the quota on the response.
    Allow {
        /// Policy class that was applied.
        route: Route,
        /// Configured maximum of that policy.
        limit: u32,
        /// The admitted check.
        result: RateLimitResult,
    },
    /// Answer with 429 Too Many Requests.
    Deny {
        /// Client key the check was made for.
        key: String,
        /// Policy class that was applied.
        route: Route,
        /// Configured maximum of that policy.
        limit: u32,
        /// The rejected check.
        result: RateLimitResult,
    },
}

/// Applies the configured policies to inbound requests against a shared
/// request history.
///
/// Cheap to clone; clones share the history and the clock.
#[derive(Clone)]
pub struct EdgeLimiter {
    policies: Arc<PolicySet>,
    store: Arc<SlidingWindowStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EdgeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeLimiter")
            .field("policies", &self.policies)
            .field("tracked_keys", &self.store.tracked_keys())
            .finish_non_exhaustive()
    }
}

impl EdgeLimiter {
    /// Creates a limiter over the given store, reading time from `clock`.
    pub fn new(policies: PolicySet, store: Arc<SlidingWindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            policies: Arc::new(policies),
            store,
            clock,
        }
    }

    /// Decides whether the request for `path` with `headers` may proceed.
    ///
    /// Never fails: if the decision cannot be computed the fault is logged
    /// and the request is let through as [`Decision::Bypass`].
    pub fn evaluate(&self, path: &str, headers: &HeaderMap) -> Decision {
        self.try_evaluate(path, headers).unwrap_or_else(|e| {
            log::error!("rate limiting failed, allowing request to proceed: {e}");
            Decision::Bypass
        })
    }

    fn try_evaluate(&self, path: &str, headers: &HeaderMap) -> Result<Decision> {
        let Some((route, config)) = self.policies.select(path) else {
            log::debug!("{path} is excluded from rate limiting");
            return Ok(Decision::Bypass);
        };

        let key = headers::client_key(headers);
        let now = self.clock.now_ms()?;
        let result = self.store.check(&key, now, config);

        log::debug!(
            "{} policy for {key} on {path}: success={} remaining={}",
            route.as_str(),
            result.success,
            result.remaining
        );

        if result.success {
            Ok(Decision::Allow {
                route,
                limit: config.max,
                result,
            })
        } else {
            Ok(Decision::Deny {
                key,
                route,
                limit: config.max,
                result,
            })
        }
    }

    /// Drops every client key with no live history under either policy.
    /// Returns the number of keys removed.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now_ms()?;
        Ok(self.store.sweep(now, self.policies.longest_window_ms()))
    }

    /// The shared request history.
    pub fn store(&self) -> &SlidingWindowStore {
        &self.store
    }

    /// The policies this limiter applies.
    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }
}
