//! TandemKV Gateway Binary
//!
//! Serves the HTTP API and forwards every request to the store service.

use clap::Parser;
use tandemkv::gateway::Gateway;
use tandemkv::GatewayConfig;

/// TandemKV HTTP gateway
#[derive(Parser, Debug)]
#[command(name = "tandemkv-gateway")]
#[command(about = "Stateless HTTP front-end for TandemKV")]
#[command(version)]
struct Args {
    /// HTTP listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:10001")]
    listen: String,

    /// Store service address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:20001")]
    store: String,

    /// Per-request budget in milliseconds
    #[arg(long, default_value = "10000")]
    request_timeout_ms: u64,

    /// Idle connections kept open to the store service
    #[arg(long, default_value = "32")]
    pool_size: usize,

    /// Milliseconds to wait for in-flight requests on shutdown
    #[arg(long, default_value = "5000")]
    shutdown_grace_ms: u64,
}

#[tokio::main]
async fn main() {
    tandemkv::logging::init();

    let args = Args::parse();
    let root = tracing::info_span!("gateway");

    tracing::info!("TandemKV gateway v{}", tandemkv::VERSION);

    let config = GatewayConfig::builder()
        .listen_addr(&args.listen)
        .store_addr(&args.store)
        .request_timeout_ms(args.request_timeout_ms)
        .max_idle_connections(args.pool_size)
        .shutdown_grace_ms(args.shutdown_grace_ms)
        .build();

    let gateway = match Gateway::bind(config, root).await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = gateway.run(shutdown_signal()).await {
        tracing::error!("Gateway error: {}", e);
        std::process::exit(1);
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Received shutdown signal, draining...");
}
