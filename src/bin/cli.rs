//! TandemKV CLI Client
//!
//! Command-line interface that talks RPC to the store service.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tandemkv::{CallContext, StoreClient};

/// TandemKV CLI
#[derive(Parser, Debug)]
#[command(name = "tandemkv-cli")]
#[command(about = "CLI for the TandemKV store service")]
struct Args {
    /// Store service address
    #[arg(short, long, default_value = "127.0.0.1:20001")]
    server: String,

    /// Per-call timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List entries under a prefix
    Scan {
        /// Key prefix (empty = all keys)
        #[arg(default_value = "")]
        prefix: String,

        /// Maximum entries (0 = unbounded)
        #[arg(short, long, default_value = "0")]
        limit: i64,
    },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let timeout = Duration::from_millis(args.timeout_ms);

    let client = match StoreClient::connect(&args.server, timeout, 1, tracing::Span::none()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("(error) {}", e);
            return ExitCode::FAILURE;
        }
    };
    let ctx = CallContext::with_timeout(timeout);

    let outcome = match args.command {
        Commands::Get { key } => client
            .get(&ctx, &key)
            .map(|value| println!("{}", String::from_utf8_lossy(&value))),
        Commands::Set { key, value } => client.put(&ctx, &key, value.as_bytes()).map(|()| println!("OK")),
        Commands::Del { key } => client.delete(&ctx, &key).map(|()| println!("OK")),
        Commands::Scan { prefix, limit } => client.scan(&ctx, &prefix, limit).map(|entries| {
            for entry in &entries {
                println!("{}\t{}", entry.key, String::from_utf8_lossy(&entry.value));
            }
            println!("({} entries)", entries.len());
        }),
        Commands::Ping => client.ping(&ctx).map(|()| println!("PONG")),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_not_found() => {
            println!("(nil)");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("(error) {}", e);
            ExitCode::FAILURE
        }
    }
}
