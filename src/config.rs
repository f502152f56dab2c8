//! Configuration loading, validation, and pre-compiled runtime state.
//!
//! The gateway reads its YAML configuration exactly once at startup.
//! Route patterns are compiled at load time and stored alongside the
//! policies so that no regex is built on the request path.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{LimiterError, PolicySet, RateLimitConfig, Result};

/// Default socket address the gateway binds to.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8100";

/// Default upstream application receiving admitted requests.
pub const DEFAULT_UPSTREAM: &str = "http://localhost:3000";

/// Default total timeout covering the upstream round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between sweeps of fully expired client keys.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Path prefixes that bypass rate limiting unless overridden.
pub const DEFAULT_EXCLUDED_PREFIXES: [&str; 4] = ["/_next/", "/api/", "/favicon.ico", "/public/"];

/// Route patterns selecting the mutation policy unless overridden.
pub const DEFAULT_MUTATION_ROUTES: [&str; 2] = ["/posts", "/comments"];

/// Raw configuration as deserialized from the YAML file.
///
/// This struct maps directly to the on-disk schema. After loading, it is
/// transformed into a [`RuntimeConfig`] that holds compiled route patterns
/// and a validated upstream URI.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Socket address the gateway listens on (default `"127.0.0.1:8100"`).
    #[serde(default)]
    pub listen: Option<String>,
    /// Application that admitted requests are forwarded to
    /// (default `"http://localhost:3000"`).
    #[serde(default)]
    pub upstream: Option<String>,
    /// Total request timeout in milliseconds covering the upstream
    /// round-trip (default: 30000). Requests exceeding this receive 504.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Interval in milliseconds between sweeps of expired client keys
    /// (default: 60000).
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,
    /// The general and mutation rate-limit policies.
    #[serde(default)]
    pub policies: PoliciesConfig,
    /// Path prefixes that bypass rate limiting. `None` keeps the defaults.
    #[serde(default)]
    pub excluded_prefixes: Option<Vec<String>>,
    /// Regex patterns selecting the mutation policy. `None` keeps the
    /// defaults.
    #[serde(default)]
    pub mutation_routes: Option<Vec<String>>,
}

/// The two independently tunable policy slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PoliciesConfig {
    /// Policy for every rate-limited path that is not a mutation route.
    #[serde(default)]
    pub general: RateLimitConfig,
    /// Policy for posts and comments.
    #[serde(default)]
    pub mutation: RateLimitConfig,
}

/// Fully validated, ready-to-use configuration.
///
/// Created once at startup and shared across all request handlers via `Arc`.
#[derive(Debug)]
pub struct RuntimeConfig {
    /// Socket address the gateway binds to.
    pub listen: SocketAddr,
    /// Validated upstream URI with scheme and authority.
    pub upstream: hyper::Uri,
    /// Total request timeout for the upstream round-trip. Expiry yields 504.
    pub request_timeout: Duration,
    /// Interval between sweeps of expired client keys.
    pub sweep_interval: Duration,
    /// Policies and the routing rules between them.
    pub policies: PolicySet,
}

fn validate_policy(name: &str, policy: &RateLimitConfig) -> Result<()> {
    if policy.window_ms == 0 {
        return Err(LimiterError::Config(format!(
            "{name} policy window_ms must be positive"
        )));
    }
    if policy.max == 0 {
        return Err(LimiterError::Config(format!(
            "{name} policy max must be positive"
        )));
    }
    Ok(())
}

fn validate_upstream(address: &str) -> Result<hyper::Uri> {
    if address.is_empty() {
        return Err(LimiterError::InvalidUpstream(
            "upstream address must not be empty".into(),
        ));
    }

    let uri = address
        .parse::<hyper::Uri>()
        .map_err(|e| LimiterError::InvalidUpstream(format!("{e}")))?;

    uri.authority().ok_or_else(|| {
        LimiterError::InvalidUpstream(format!("upstream URI has no authority: {address}"))
    })?;
    uri.scheme().ok_or_else(|| {
        LimiterError::InvalidUpstream(format!("upstream URI has no scheme: {address}"))
    })?;

    Ok(uri)
}

impl Config {
    /// Loads configuration from a YAML file at the given path.
    ///
    /// Returns a [`LimiterError::Config`] if the file cannot be opened or
    /// its contents fail YAML deserialization.
    pub fn load_from_file(file_path: &(impl AsRef<Path> + ?Sized)) -> Result<Self> {
        let file = std::fs::File::open(file_path).map_err(|e| {
            LimiterError::Config(format!(
                "failed to open {}: {e}",
                file_path.as_ref().display()
            ))
        })?;

        serde_yaml::from_reader(file)
            .map_err(|e| LimiterError::Config(format!("failed to parse config: {e}")))
    }

    /// Validates all fields and compiles route patterns, producing a
    /// [`RuntimeConfig`] suitable for the request hot path.
    pub fn into_runtime(self) -> Result<RuntimeConfig> {
        let listen_str = self.listen.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR);
        let listen = listen_str.parse::<SocketAddr>().map_err(|e| {
            LimiterError::Config(format!("invalid listen address \"{listen_str}\": {e}"))
        })?;

        let upstream = validate_upstream(self.upstream.as_deref().unwrap_or(DEFAULT_UPSTREAM))?;

        validate_policy("general", &self.policies.general)?;
        validate_policy("mutation", &self.policies.mutation)?;

        let excluded_prefixes = self.excluded_prefixes.unwrap_or_else(|| {
            DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect()
        });

        let mutation_routes = self
            .mutation_routes
            .unwrap_or_else(|| {
                DEFAULT_MUTATION_ROUTES
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            })
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    LimiterError::Config(format!("invalid mutation route {pattern}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let request_timeout = self
            .request_timeout_ms
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis);

        let sweep_interval = self
            .sweep_interval_ms
            .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_millis);
        if sweep_interval.is_zero() {
            return Err(LimiterError::Config(
                "sweep_interval_ms must be positive".into(),
            ));
        }

        Ok(RuntimeConfig {
            listen,
            upstream,
            request_timeout,
            sweep_interval,
            policies: PolicySet {
                general: self.policies.general,
                mutation: self.policies.mutation,
                excluded_prefixes,
                mutation_routes,
            },
        })
    }
}
