//!
//! An edge gateway that rate limits clients with a sliding window before
//! handing requests to an application, built on [Hyper].
//!
//! Each client, identified by its forwarding headers, may make at most
//! `max` requests in any `window_ms` span. Paths are routed to one of two
//! independently tuned policies (a general one, and a mutation one for posts
//! and comments); static assets and framework internals bypass limiting.
//! Admitted responses carry `X-RateLimit-*` headers, rejected requests get a
//! JSON 429 with `Retry-After`, and any internal fault while deciding lets
//! the request through.
//!
//! [Hyper]: https://hyper.rs/

pub mod clock;
pub mod config;
pub mod error;
pub mod headers;
pub mod limiter;
pub mod policy;
pub mod proxy;
pub mod rate_limit;
pub mod response;
pub mod server;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, PoliciesConfig, RuntimeConfig};
pub use error::LimiterError;
pub use limiter::{Decision, EdgeLimiter};
pub use policy::{PolicySet, Route};
pub use proxy::{build_client, handle_request, HttpClient};
pub use rate_limit::{RateLimitConfig, RateLimitResult, SlidingWindowStore};

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
