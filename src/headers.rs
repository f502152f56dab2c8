//! HTTP header processing: client key extraction from forwarding headers and
//! hop-by-hop removal on the way to and from the upstream application.
//!
//! Client keys come from the de-facto proxy headers set by whatever sits in
//! front of the gateway (load balancer, CDN, hosting platform). Their values
//! are taken as-is; the key is only as trustworthy as that proxy.

use hyper::header::{HeaderMap, HeaderName};

/// Client key used when no forwarding header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// How a forwarding header carries the client address.
#[derive(Debug, Clone, Copy)]
enum Forwarded {
    /// A comma-separated chain whose first element is the originating client.
    Chain,
    /// A single address.
    Single,
}

/// Forwarding headers consulted for the client key, in precedence order.
const CLIENT_KEY_HEADERS: [(&str, Forwarded); 4] = [
    ("x-forwarded-for", Forwarded::Chain),
    ("x-real-ip", Forwarded::Single),
    ("cf-connecting-ip", Forwarded::Single),
    ("x-vercel-forwarded-for", Forwarded::Chain),
];

/// Returns the key identifying the client that sent a request.
///
/// The first present header wins, in this order: `X-Forwarded-For` (first
/// comma-separated element), `X-Real-IP`, `CF-Connecting-IP`,
/// `X-Vercel-Forwarded-For` (first element). Values are trimmed but not
/// validated. Falls back to [`UNKNOWN_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    CLIENT_KEY_HEADERS
        .iter()
        .find_map(|(name, kind)| {
            let value = headers.get(*name)?.to_str().ok()?;
            let value = match kind {
                Forwarded::Chain => value.split(',').next().unwrap_or_default(),
                Forwarded::Single => value,
            }
            .trim();
            (!value.is_empty()).then(|| value.to_owned())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

/// Removes all hop-by-hop headers from the given header map.
///
/// Strips the standard set defined in RFC 7230 Section 6.1 (`Connection`,
/// `Keep-Alive`, `Proxy-Authenticate`, `Proxy-Authorization`, `TE`,
/// `Trailers`, `Transfer-Encoding`, `Upgrade`), plus any additional
/// header names declared in the `Connection` header value.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let conn: Vec<HeaderName> = headers
        .get(hyper::header::CONNECTION)
        .and_then(|val| val.to_str().ok())
        .map(|val| {
            val.split(',')
                .filter_map(|s| HeaderName::from_bytes(s.trim().as_bytes()).ok())
                .collect()
        })
        .unwrap_or_default();

    conn.iter().for_each(|name| {
        headers.remove(name);
    });

    [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ]
    .iter()
    .for_each(|name| {
        headers.remove(*name);
    });
}
