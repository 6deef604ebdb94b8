//! Configuration for TandemKV
//!
//! Centralized configuration with sensible defaults. The store service is
//! described by [`Config`] (backend, engine, manager, server sections); the
//! gateway by [`GatewayConfig`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TandemError};

// =============================================================================
// Engine
// =============================================================================

/// Configuration for the embedded log-structured engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for all data files (WAL, SSTables, etc.)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tandemkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
        }
    }
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

// =============================================================================
// Backend selection
// =============================================================================

/// Which Store backend the service runs on. Resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Hash map guarded by a reader/writer lock; lost on restart
    Memory,

    /// Embedded WAL + SSTable engine under `data_dir`
    #[default]
    Persistent,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::Persistent => f.write_str("persistent"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "persistent" | "disk" => Ok(BackendKind::Persistent),
            other => Err(format!(
                "unknown backend '{}' (expected 'memory' or 'persistent')",
                other
            )),
        }
    }
}

// =============================================================================
// Manager
// =============================================================================

/// Manager pipeline settings.
///
/// Changing `use_compression` after data was written makes the earlier values
/// unreadable until the original setting is restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    pub use_compression: bool,
}

// =============================================================================
// RPC server
// =============================================================================

/// Store service RPC listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Read timeout once a request frame has started arriving (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// How long shutdown waits for in-flight connections (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:20001".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            shutdown_grace_ms: 5000,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

// =============================================================================
// Store service
// =============================================================================

/// Main configuration for a store service instance
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Backend the Manager is bound to
    pub backend: BackendKind,

    /// Embedded engine settings (ignored by the memory backend)
    pub engine: EngineConfig,

    /// Namespacing/compression pipeline settings
    pub manager: ManagerConfig,

    /// RPC listener settings
    pub server: ServerConfig,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(TandemError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.backend == BackendKind::Persistent && self.engine.memtable_size_limit == 0 {
            return Err(TandemError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.engine.wal_sync_strategy {
            return Err(TandemError::Config(
                "WAL sync interval must be at least 1 entry".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Select the storage backend
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.config.backend = kind;
        self
    }

    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engine.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.engine.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.engine.memtable_size_limit = size;
        self
    }

    /// Enable or disable value compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.config.manager.use_compression = enabled;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.server.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.server.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.server.write_timeout_ms = ms;
        self
    }

    /// Set the shutdown grace period (in milliseconds)
    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.server.shutdown_grace_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Gateway
// =============================================================================

/// Configuration for the HTTP gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP listen address
    pub listen_addr: String,

    /// Address of the store service RPC endpoint
    pub store_addr: String,

    /// Budget for one proxied request, end to end (milliseconds)
    pub request_timeout_ms: u64,

    /// Dial timeout for new store connections (milliseconds)
    pub connect_timeout_ms: u64,

    /// Idle store connections kept for reuse
    pub max_idle_connections: usize,

    /// How long shutdown waits for in-flight requests (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:10001".to_string(),
            store_addr: "127.0.0.1:20001".to_string(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
            max_idle_connections: 32,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl GatewayConfig {
    /// Create a new gateway config builder
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(TandemError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_idle_connections == 0 {
            return Err(TandemError::Config(
                "max_idle_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for GatewayConfig
#[derive(Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn store_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.store_addr = addr.into();
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn max_idle_connections(mut self, count: usize) -> Self {
        self.config.max_idle_connections = count;
        self
    }

    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_grace_ms = ms;
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }
}
