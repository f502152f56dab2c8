//! Rate-limit response metadata: quota headers on admitted responses and the
//! 429 rejection.
//!
//! Nothing here touches the request history; it only renders a
//! [`RateLimitResult`].

use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

use crate::{RateLimitResult, Result};

/// Configured maximum of the policy that was applied.
pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
/// Requests left in the current window.
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
/// Epoch milliseconds at which the oldest live request leaves the window.
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// JSON body of a 429 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub error: &'static str,
    pub message: &'static str,
    pub retry_after: u64,
    pub remaining: u32,
    pub reset_time: i64,
}

impl Rejection {
    fn from_result(result: &RateLimitResult) -> Self {
        Self {
            error: "Rate limit exceeded",
            message: "Too many requests. Please try again later.",
            retry_after: result.retry_after.unwrap_or_default(),
            remaining: result.remaining,
            reset_time: result.reset_time,
        }
    }
}

/// Builds the three `X-RateLimit-*` headers for a check under a policy
/// allowing `limit` requests.
pub fn rate_limit_headers(limit: u32, result: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(result.reset_time));
    headers
}

/// Copies the quota headers onto an outgoing response, replacing any the
/// upstream set.
pub fn decorate<B>(response: &mut Response<B>, limit: u32, result: &RateLimitResult) {
    response
        .headers_mut()
        .extend(rate_limit_headers(limit, result));
}

/// Builds the 429 Too Many Requests response for a rejected check.
pub fn too_many_requests(limit: u32, result: &RateLimitResult) -> Result<Response<Body>> {
    let retry_after = result.retry_after.unwrap_or_default();
    let body = serde_json::to_vec(&Rejection::from_result(result))
        .map_err(|e| crate::LimiterError::Internal(format!("failed to encode rejection: {e}")))?;

    let mut response = Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header(CONTENT_TYPE, "application/json")
        .header(RETRY_AFTER, retry_after)
        .body(Body::from(body))?;
    response
        .headers_mut()
        .extend(rate_limit_headers(limit, result));
    Ok(response)
}
