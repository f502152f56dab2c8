use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use edge_limiter::server::{serve, shutdown_signal, spawn_sweeper};
use edge_limiter::{build_client, Config, EdgeLimiter, SlidingWindowStore, SystemClock};

/// Sliding-window rate limiting gateway.
#[derive(Parser, Debug)]
#[command(name = "edge-limiter", version, about)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "./Config.yml")]
    config: PathBuf,

    /// Overrides the listen address from the configuration file.
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = Config::load_from_file(&args.config)
        .map(|mut c| {
            if args.listen.is_some() {
                c.listen = args.listen.clone();
            }
            c
        })
        .and_then(|c| c.into_runtime())
        .unwrap_or_else(|e| {
            log::error!("fatal: {e}");
            std::process::exit(1);
        });

    let listener = TcpListener::bind(config.listen).unwrap_or_else(|e| {
        log::error!("fatal: failed to bind {}: {e}", config.listen);
        std::process::exit(1);
    });

    log::info!(
        "general policy: {} requests per {}ms, mutation policy: {} requests per {}ms",
        config.policies.general.max,
        config.policies.general.window_ms,
        config.policies.mutation.max,
        config.policies.mutation.window_ms,
    );

    let config = Arc::new(config);
    let limiter = EdgeLimiter::new(
        config.policies.clone(),
        Arc::new(SlidingWindowStore::new()),
        Arc::new(SystemClock),
    );

    let sweeper = spawn_sweeper(limiter.clone(), config.sweep_interval);

    if let Err(e) = serve(listener, build_client(), config, limiter, shutdown_signal()).await {
        log::error!("server error: {e}");
    }

    sweeper.abort();
}
