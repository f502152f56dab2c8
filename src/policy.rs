//! Path-based routing of requests to rate-limit policies.

use regex::Regex;

use crate::RateLimitConfig;

/// Which policy, if any, governs a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Static assets and framework internals; never rate limited.
    Excluded,
    /// Content-mutation resources (posts, comments).
    Mutation,
    /// Everything else.
    General,
}

impl Route {
    /// Label used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excluded => "excluded",
            Self::Mutation => "mutation",
            Self::General => "general",
        }
    }
}

/// The two policy slots and the path rules that select between them.
///
/// Both policies are tuned independently even when their values coincide.
#[derive(Debug, Clone)]
pub struct PolicySet {
    /// Applied to paths that match none of the other rules.
    pub general: RateLimitConfig,
    /// Applied to paths matching a mutation route.
    pub mutation: RateLimitConfig,
    /// Path prefixes that bypass rate limiting.
    pub excluded_prefixes: Vec<String>,
    /// Compiled patterns identifying mutation routes.
    pub mutation_routes: Vec<Regex>,
}

impl PolicySet {
    /// Classifies `path`.
    ///
    /// Paths with an excluded prefix, or containing a `.` (a file extension),
    /// are [`Route::Excluded`]. Exclusion is decided before any policy match.
    pub fn route(&self, path: &str) -> Route {
        if path.contains('.')
            || self
                .excluded_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Route::Excluded;
        }

        if self.mutation_routes.iter().any(|re| re.is_match(path)) {
            Route::Mutation
        } else {
            Route::General
        }
    }

    /// Returns the policy for `path`, or `None` when the path bypasses the
    /// limiter.
    pub fn select(&self, path: &str) -> Option<(Route, &RateLimitConfig)> {
        match self.route(path) {
            Route::Excluded => None,
            Route::Mutation => Some((Route::Mutation, &self.mutation)),
            Route::General => Some((Route::General, &self.general)),
        }
    }

    /// The longest window of either policy. Keys idle for longer than this
    /// hold no live history under any policy.
    pub fn longest_window_ms(&self) -> u64 {
        self.general.window_ms.max(self.mutation.window_ms)
    }
}
