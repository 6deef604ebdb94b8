//! # TandemKV
//!
//! A namespaced, optionally-compressed key-value store split across two
//! processes:
//! - a stateless HTTP **gateway** that accepts client requests
//! - a **store service** that owns the storage backend and is reached only
//!   through an internal RPC protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     HTTP Gateway (axum)                      │
//! │              GET / PUT / DELETE /{key}, GET /?prefix         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  pooled TCP, bincode frames
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Store Service (RPC)                        │
//! │              thread per connection, sole writer              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Manager                               │
//! │           "data/" namespace + optional LZ4 values            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Store trait
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────────────┐
//!   │ MemoryStore │          │ PersistentStore → Engine │
//!   │  (RwLock)   │          │  WAL + MemTable + SSTable│
//!   └─────────────┘          └──────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;
pub mod logging;

pub mod engine;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod manager;
pub mod store;

pub mod gateway;
pub mod network;
pub mod protocol;
pub mod service;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{BackendKind, Config, EngineConfig, GatewayConfig, ManagerConfig};
pub use context::{CallContext, Interrupted};
pub use engine::Engine;
pub use error::{Result, TandemError};
pub use manager::{KeyValuePair, Manager, ManagerError, ScanResult};
pub use network::{ClientError, StoreClient};
pub use service::StoreService;
pub use store::{Backend, MemoryStore, PersistentStore, ScanOptions, Store, StoreError, Visit};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TandemKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
