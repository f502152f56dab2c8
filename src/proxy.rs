//! Edge gateway handler: rate limiting, then forwarding to the application.
//!
//! Every inbound request passes through [`EdgeLimiter::evaluate`] before
//! anything else. Rejected requests are answered here with a 429; all others
//! are forwarded to the configured upstream, and admitted ones get their
//! quota headers added to the upstream response.

use std::sync::Arc;
use std::time::Instant;

use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response, Uri};
use tokio::time::timeout;

use crate::{headers, response, Decision, EdgeLimiter, LimiterError, Result, RuntimeConfig};

/// The HTTP client type for upstream connections.
pub type HttpClient = Client<HttpConnector, Body>;

/// Constructs the client used to reach the upstream application.
pub fn build_client() -> HttpClient {
    Client::builder()
        .http1_title_case_headers(true)
        .http1_preserve_header_case(true)
        .build_http()
}

/// Processes a single inbound request through the gateway pipeline.
///
/// 1. **Rate limiting**: the path is routed to a policy and the client key
///    checked against it. Rejections are answered with 429 and never reach
///    the upstream. Excluded paths, and any failure to reach a decision,
///    pass through unlimited.
/// 2. **Hop-by-hop stripping**: connection-scoped headers are removed
///    before forwarding, per RFC 7230 §6.1.
/// 3. **URI rewriting**: the request is retargeted at the upstream,
///    preserving path and query.
/// 4. **Forwarding**: bounded by the configured request timeout.
/// 5. **Decoration**: admitted requests get `X-RateLimit-*` headers on the
///    upstream response.
pub async fn handle_request(
    req: Request<Body>,
    client: HttpClient,
    config: Arc<RuntimeConfig>,
    limiter: EdgeLimiter,
) -> Result<Response<Body>> {
    let decision = limiter.evaluate(req.uri().path(), req.headers());

    let quota = match decision {
        Decision::Deny {
            key,
            route,
            limit,
            result,
        } => {
            log::warn!(
                "rate limit exceeded for {key} on {} ({} policy), retry after {}s",
                req.uri().path(),
                route.as_str(),
                result.retry_after.unwrap_or_default()
            );
            match response::too_many_requests(limit, &result) {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    log::error!("rate limiting failed, allowing request to proceed: {e}");
                    None
                }
            }
        }
        Decision::Allow { limit, result, .. } => Some((limit, result)),
        Decision::Bypass => None,
    };

    let mut upstream_resp = forward(req, client, &config).await?;

    if let Some((limit, result)) = quota {
        response::decorate(&mut upstream_resp, limit, &result);
    }

    Ok(upstream_resp)
}

/// Sends the request to the upstream application and returns its response
/// with hop-by-hop headers removed.
async fn forward(
    req: Request<Body>,
    client: HttpClient,
    config: &RuntimeConfig,
) -> Result<Response<Body>> {
    let (mut parts, body) = req.into_parts();
    headers::strip_hop_by_hop(&mut parts.headers);
    parts.uri = rewrite_uri(&parts.uri, &config.upstream)?;

    log::debug!("forwarding {} {}", parts.method, parts.uri);

    let start = Instant::now();
    let upstream_result = timeout(
        config.request_timeout,
        client.request(Request::from_parts(parts, body)),
    )
    .await;

    let mut upstream_resp = match upstream_result {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            log::warn!(
                "upstream request to {} failed after {}ms: {e}",
                config.upstream,
                start.elapsed().as_millis()
            );
            return Err(LimiterError::Upstream(e));
        }
        Err(_elapsed) => {
            log::warn!(
                "upstream request to {} timed out after {:?}",
                config.upstream,
                config.request_timeout
            );
            return Err(LimiterError::Timeout(config.request_timeout));
        }
    };

    log::info!(
        "upstream responded {} in {}ms",
        upstream_resp.status().as_u16(),
        start.elapsed().as_millis()
    );

    headers::strip_hop_by_hop(upstream_resp.headers_mut());
    Ok(upstream_resp)
}

/// Rewrites the original request URI to target the configured upstream,
/// preserving the path and query string.
fn rewrite_uri(original: &Uri, upstream: &Uri) -> Result<Uri> {
    let authority = upstream
        .authority()
        .ok_or_else(|| LimiterError::InvalidUpstream("upstream has no authority".into()))?;

    let scheme = upstream
        .scheme()
        .ok_or_else(|| LimiterError::InvalidUpstream("upstream has no scheme".into()))?;

    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(scheme.clone())
        .authority(authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| LimiterError::Internal(format!("failed to build upstream URI: {e}")))
}
