//! TandemKV Store Service Binary
//!
//! Owns the storage backend and serves it over RPC.

use clap::Parser;
use tandemkv::config::WalSyncStrategy;
use tandemkv::{BackendKind, Config, StoreService};

/// TandemKV store service
#[derive(Parser, Debug)]
#[command(name = "tandemkv-store")]
#[command(about = "Storage-owning RPC service for TandemKV")]
#[command(version)]
struct Args {
    /// Backend: memory or persistent
    #[arg(short, long, default_value = "persistent")]
    backend: BackendKind,

    /// Data directory (persistent backend)
    #[arg(short, long, default_value = "./tandemkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:20001")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// MemTable size limit in MB before flush
    #[arg(short = 'M', long, default_value = "64")]
    memtable_mb: usize,

    /// fsync the WAL after every N commits (0 = every commit)
    #[arg(long, default_value = "100")]
    sync_every: usize,

    /// Store values LZ4-compressed
    #[arg(short = 'c', long)]
    compress: bool,

    /// Milliseconds to wait for in-flight calls on shutdown
    #[arg(long, default_value = "5000")]
    shutdown_grace_ms: u64,
}

fn main() {
    tandemkv::logging::init();

    let args = Args::parse();
    let root = tracing::info_span!("store_service");

    tracing::info!("TandemKV store service v{}", tandemkv::VERSION);
    tracing::info!("Backend: {}", args.backend);
    if args.backend == BackendKind::Persistent {
        tracing::info!("Data directory: {}", args.data_dir);
    }

    let sync = if args.sync_every == 0 {
        WalSyncStrategy::EveryWrite
    } else {
        WalSyncStrategy::EveryNEntries {
            count: args.sync_every,
        }
    };

    let config = Config::builder()
        .backend(args.backend)
        .data_dir(&args.data_dir)
        .wal_sync_strategy(sync)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .use_compression(args.compress)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .shutdown_grace_ms(args.shutdown_grace_ms)
        .build();

    let service = match StoreService::start(&config, root) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start store service: {}", e);
            std::process::exit(1);
        }
    };

    let handle = service.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal, draining...");
        handle.shutdown();
    }) {
        tracing::error!("Failed to install signal handler: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = service.run() {
        tracing::error!("Store service error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Store service stopped");
}
