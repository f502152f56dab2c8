//! Server accept loop, background sweep, and graceful shutdown.
//!
//! Kept apart from `main()` so the gateway can be started against any
//! listener (integration tests bind port 0) without process-level concerns
//! like argument parsing or `std::process::exit`.

use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};

use crate::{handle_request, EdgeLimiter, HttpClient, LimiterError, Result, RuntimeConfig};

/// Serves the gateway on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to complete before this returns.
pub async fn serve(
    listener: TcpListener,
    client: HttpClient,
    config: Arc<RuntimeConfig>,
    limiter: EdgeLimiter,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let make_service = make_service_fn(move |conn: &AddrStream| {
        let client = client.clone();
        let config = Arc::clone(&config);
        let limiter = limiter.clone();
        let remote_addr = conn.remote_addr();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let client = client.clone();
                let config = Arc::clone(&config);
                let limiter = limiter.clone();
                async move {
                    log::debug!("{} {} from {remote_addr}", req.method(), req.uri());
                    let resp = handle_request(req, client, config, limiter)
                        .await
                        .unwrap_or_else(|e| {
                            log::warn!("request from {remote_addr} failed: {e}");
                            e.into_response()
                        });
                    Ok::<Response<Body>, Infallible>(resp)
                }
            }))
        }
    });

    let server = Server::from_tcp(listener)
        .map_err(|e| LimiterError::Config(format!("failed to bind listener: {e}")))?
        .http1_preserve_header_case(true)
        .http1_title_case_headers(true)
        .serve(make_service);

    log::info!("listening on http://{}", server.local_addr());

    server
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| LimiterError::Internal(format!("server error: {e}")))?;

    log::info!("shut down, no longer accepting connections");
    Ok(())
}

/// Spawns a background task that periodically drops client keys with no
/// live history, bounding the store to recently active clients.
pub fn spawn_sweeper(limiter: EdgeLimiter, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let before = limiter.store().tracked_keys();
            match limiter.sweep() {
                Ok(0) => {}
                Ok(pruned) => log::info!(
                    "rate limiter sweep pruned {pruned} of {before} client keys"
                ),
                Err(e) => log::error!("rate limiter sweep failed: {e}"),
            }
        }
    })
}

/// Awaits a shutdown signal (SIGINT or SIGTERM on Unix, Ctrl+C on all
/// platforms). Returns once the first signal is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("received SIGINT, initiating graceful shutdown"),
        _ = terminate => log::info!("received SIGTERM, initiating graceful shutdown"),
    }
}
