//! Shared test infrastructure for integration tests.
//!
//! Provides throwaway HTTP backends standing in for the application behind
//! the gateway, configuration builders, and request helpers used across
//! all integration test modules.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use edge_limiter::{
    build_client, Config, EdgeLimiter, HttpClient, ManualClock, PoliciesConfig, RateLimitConfig,
    RuntimeConfig, SlidingWindowStore,
};
use tokio::sync::oneshot;

/// Start of the test clock: 2023-11-14T22:13:20Z.
pub const T0: i64 = 1_700_000_000_000;

/// Initializes a logger that writes through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_client() -> HttpClient {
    build_client()
}

/// Builds a `RuntimeConfig` forwarding to `addr` with the given policies.
pub fn test_config(
    addr: SocketAddr,
    general: RateLimitConfig,
    mutation: RateLimitConfig,
) -> Arc<RuntimeConfig> {
    Arc::new(
        Config {
            upstream: Some(format!("http://{addr}")),
            policies: PoliciesConfig { general, mutation },
            ..Default::default()
        }
        .into_runtime()
        .expect("test config must be valid"),
    )
}

/// Builds a `RuntimeConfig` with a short upstream timeout.
pub fn test_config_with_timeout(addr: SocketAddr, timeout_ms: u64) -> Arc<RuntimeConfig> {
    Arc::new(
        Config {
            upstream: Some(format!("http://{addr}")),
            request_timeout_ms: Some(timeout_ms),
            ..Default::default()
        }
        .into_runtime()
        .expect("test config must be valid"),
    )
}

/// Builds a limiter over a fresh store for `config`, driven by `clock`.
pub fn test_limiter(config: &RuntimeConfig, clock: &ManualClock) -> EdgeLimiter {
    EdgeLimiter::new(
        config.policies.clone(),
        Arc::new(SlidingWindowStore::new()),
        Arc::new(clock.clone()),
    )
}

/// Builds a GET request for `path` from the client at `ip`.
pub fn request_from(ip: &str, path: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("http://gateway.test{path}"))
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .expect("test request must build")
}

/// Reads a header as a string, panicking if it is missing.
pub fn header<'a>(resp: &'a Response<Body>, name: &str) -> &'a str {
    resp.headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .expect("header must be ASCII")
}

/// Collects a response body into JSON.
pub async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let bytes = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("failed to collect response body");
    serde_json::from_slice(&bytes).expect("body must be JSON")
}

/// Starts a local HTTP server that responds to every request with the given
/// status, content-type, and body. Returns the server address and a handle
/// to shut it down.
pub async fn start_backend(
    status: StatusCode,
    content_type: &'static str,
    body: &'static str,
) -> (SocketAddr, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel::<()>();

    let make_svc = make_service_fn(move |_| async move {
        Ok::<_, std::convert::Infallible>(service_fn(move |_req: Request<Body>| async move {
            Ok::<_, std::convert::Infallible>(
                Response::builder()
                    .status(status)
                    .header("content-type", content_type)
                    .header("connection", "keep-alive")
                    .header("keep-alive", "timeout=5")
                    .body(Body::from(body))
                    .expect("test response must build"),
            )
        }))
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();

    tokio::spawn(async move {
        let graceful = server.with_graceful_shutdown(async {
            let _ = rx.await;
        });
        let _ = graceful.await;
    });

    (addr, tx)
}

/// Starts a local backend that echoes the request path and headers as the
/// response body. Used to verify what the gateway forwards.
pub async fn start_echo_backend() -> (SocketAddr, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel::<()>();

    let make_svc = make_service_fn(|_| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let mut lines = vec![format!("path: {}", req.uri())];
            for (name, value) in req.headers() {
                if let Ok(v) = value.to_str() {
                    lines.push(format!("{}: {}", name.as_str(), v));
                }
            }
            Ok::<_, std::convert::Infallible>(
                Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "text/plain")
                    .body(Body::from(lines.join("\n")))
                    .expect("test response must build"),
            )
        }))
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();

    tokio::spawn(async move {
        let graceful = server.with_graceful_shutdown(async {
            let _ = rx.await;
        });
        let _ = graceful.await;
    });

    (addr, tx)
}

/// Starts a backend that sleeps for the given duration before responding.
pub async fn start_slow_backend(delay: Duration) -> (SocketAddr, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel::<()>();

    let make_svc = make_service_fn(move |_| async move {
        Ok::<_, std::convert::Infallible>(service_fn(move |_req: Request<Body>| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, std::convert::Infallible>(
                Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::from("slow"))
                    .expect("test response must build"),
            )
        }))
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();

    tokio::spawn(async move {
        let graceful = server.with_graceful_shutdown(async {
            let _ = rx.await;
        });
        let _ = graceful.await;
    });

    (addr, tx)
}

/// Returns an address on which nothing is listening.
pub fn dead_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind must succeed");
    listener.local_addr().expect("listener has an address")
}
