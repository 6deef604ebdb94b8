//! Store Module
//!
//! The contract every storage backend satisfies, plus the two backends.
//!
//! ## Scan protocol
//! `scan` visits every entry whose key starts with `ScanOptions::prefix`, in
//! backend order. The visitor decides how iteration continues:
//! - `Ok(Visit::Continue)`: deliver the next entry
//! - `Ok(Visit::Stop)`: end iteration, the scan succeeds
//! - `Err(e)`: end iteration, the scan fails with `e`
//!
//! Reaching `ScanOptions::limit` delivered entries also ends iteration
//! normally. Every backend enforces the limit itself, and releases its locks
//! or transactions on every exit path.

mod memory;
mod persistent;

use bytes::Bytes;
use thiserror::Error;

use crate::config::{BackendKind, EngineConfig};
use crate::context::{CallContext, Interrupted};
use crate::error::TandemError;

pub use memory::MemoryStore;
pub use persistent::PersistentStore;

/// Errors produced by a Store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has no value
    #[error("key not found")]
    NotFound,

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// Any backend failure other than a missing key
    #[error("store I/O failure: {0}")]
    Io(#[from] TandemError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// What a scan visitor wants next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// Restricts a scan to a key prefix and caps how many entries it delivers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Only keys starting with this are visited (empty = all keys)
    pub prefix: Vec<u8>,

    /// Maximum entries delivered (0 = unbounded)
    pub limit: usize,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }
}

/// Counts delivered entries against `ScanOptions::limit`
#[derive(Debug, Clone, Copy)]
pub(crate) struct LimitCounter {
    limit: usize,
    delivered: usize,
}

impl LimitCounter {
    pub(crate) fn new(limit: usize) -> Self {
        Self { limit, delivered: 0 }
    }

    /// Whether another entry may be delivered; records it if so
    pub(crate) fn admit(&mut self) -> bool {
        if self.limit != 0 && self.delivered >= self.limit {
            return false;
        }
        self.delivered += 1;
        true
    }
}

/// Uniform key-value contract implemented by every backend
///
/// All operations are safe to call concurrently. A cancelled context or an
/// elapsed deadline fails the call with `StoreError::Interrupted`.
pub trait Store: Send + Sync {
    /// Upsert `key`
    fn set(&self, ctx: &CallContext, key: &[u8], value: Bytes) -> Result<(), StoreError>;

    /// Value of `key`, or `StoreError::NotFound`
    fn get(&self, ctx: &CallContext, key: &[u8]) -> Result<Bytes, StoreError>;

    /// Remove `key`; removing an absent key succeeds
    fn delete(&self, ctx: &CallContext, key: &[u8]) -> Result<(), StoreError>;

    /// Visit entries under `opts.prefix` (see the module docs)
    fn scan<E, F>(&self, ctx: &CallContext, opts: &ScanOptions, visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<Visit, E>,
        E: From<StoreError>;

    /// Release the backend; later calls fail with `StoreError::Io`
    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The closed set of backends the service can run on
pub enum Backend {
    Memory(MemoryStore),
    Persistent(PersistentStore),
}

impl Backend {
    /// Open the backend selected by `kind`
    pub fn open(
        kind: BackendKind,
        engine: &EngineConfig,
        span: tracing::Span,
    ) -> Result<Self, TandemError> {
        let backend = match kind {
            BackendKind::Memory => Backend::Memory(MemoryStore::new(span)),
            BackendKind::Persistent => {
                Backend::Persistent(PersistentStore::open(engine.clone(), span)?)
            }
        };
        tracing::info!(backend = %kind, "store backend ready");
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Memory(_) => BackendKind::Memory,
            Backend::Persistent(_) => BackendKind::Persistent,
        }
    }
}

impl Store for Backend {
    fn set(&self, ctx: &CallContext, key: &[u8], value: Bytes) -> Result<(), StoreError> {
        match self {
            Backend::Memory(s) => s.set(ctx, key, value),
            Backend::Persistent(s) => s.set(ctx, key, value),
        }
    }

    fn get(&self, ctx: &CallContext, key: &[u8]) -> Result<Bytes, StoreError> {
        match self {
            Backend::Memory(s) => s.get(ctx, key),
            Backend::Persistent(s) => s.get(ctx, key),
        }
    }

    fn delete(&self, ctx: &CallContext, key: &[u8]) -> Result<(), StoreError> {
        match self {
            Backend::Memory(s) => s.delete(ctx, key),
            Backend::Persistent(s) => s.delete(ctx, key),
        }
    }

    fn scan<E, F>(&self, ctx: &CallContext, opts: &ScanOptions, visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<Visit, E>,
        E: From<StoreError>,
    {
        match self {
            Backend::Memory(s) => s.scan(ctx, opts, visit),
            Backend::Persistent(s) => s.scan(ctx, opts, visit),
        }
    }

    fn close(&self) -> Result<(), StoreError> {
        match self {
            Backend::Memory(s) => s.close(),
            Backend::Persistent(s) => s.close(),
        }
    }
}
