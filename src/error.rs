//! Error types and HTTP status code mapping.

use hyper::{Body, Response, StatusCode};
use std::fmt;
use std::time::Duration;

/// Every failure the gateway can produce, each mapping to a specific HTTP status.
///
/// Exceeding a rate limit is not represented here: a rejection is an expected
/// [`Decision`](crate::Decision), not a fault.
#[derive(Debug)]
pub enum LimiterError {
    /// The configuration file could not be loaded, parsed, or validated.
    Config(String),
    /// The upstream target URI is malformed or unparseable.
    InvalidUpstream(String),
    /// The wall clock could not produce an epoch timestamp.
    Clock(String),
    /// The upstream application returned an error or was unreachable.
    Upstream(hyper::Error),
    /// The upstream round-trip exceeded the configured request timeout.
    Timeout(Duration),
    /// An internal error that does not fit other categories.
    Internal(String),
}

impl fmt::Display for LimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidUpstream(msg) => write!(f, "invalid upstream: {msg}"),
            Self::Clock(msg) => write!(f, "clock unavailable: {msg}"),
            Self::Upstream(err) => write!(f, "upstream error: {err}"),
            Self::Timeout(after) => write!(f, "upstream timed out after {}ms", after.as_millis()),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for LimiterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

impl LimiterError {
    /// Returns the HTTP status code corresponding to this error variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Internal(_) | Self::InvalidUpstream(_) | Self::Clock(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Converts this error into an HTTP response with a JSON body.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": match &self {
                Self::Config(_) => "config_error",
                Self::InvalidUpstream(_) => "invalid_upstream",
                Self::Clock(_) => "clock_error",
                Self::Upstream(_) => "upstream_error",
                Self::Timeout(_) => "upstream_timeout",
                Self::Internal(_) => "internal_error",
            },
            "message": self.to_string(),
        });

        Response::builder()
            .status(status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| {
                let mut fallback = Response::new(Body::empty());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

impl From<hyper::Error> for LimiterError {
    fn from(err: hyper::Error) -> Self {
        Self::Upstream(err)
    }
}

impl From<hyper::http::Error> for LimiterError {
    fn from(err: hyper::http::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<hyper::header::InvalidHeaderValue> for LimiterError {
    fn from(err: hyper::header::InvalidHeaderValue) -> Self {
        Self::Internal(err.to_string())
    }
}
