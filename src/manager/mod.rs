//! Manager Module
//!
//! Sits between callers and one Store. Callers speak in logical keys and
//! values; the Manager namespaces keys under [`NAMESPACE_PREFIX`] and, when
//! configured, stores values LZ4-compressed.
//!
//! ```text
//!   logical key "user/1"  ──wrap──▶  physical key "data/user/1"
//!   logical value         ──lz4───▶  physical value (if use_compression)
//! ```

mod codec;
mod keys;

use bytes::Bytes;
use thiserror::Error;

use crate::config::ManagerConfig;
use crate::context::{CallContext, Interrupted};
use crate::store::{ScanOptions, Store, StoreError, Visit};

pub use codec::{compress, decompress, MAX_DECOMPRESSED_SIZE};
pub use keys::{unwrap_key, wrap_key, NAMESPACE_PREFIX};

/// Initial capacity of the scan accumulator
const SCAN_CAPACITY: usize = 64;

/// One logical entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: Bytes,
    pub value: Bytes,
}

/// Entries returned by a scan, in backend iteration order
pub type ScanResult = Vec<KeyValuePair>;

/// Errors produced by the Manager
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("key not found")]
    NotFound,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Stored data could not be turned back into a logical entry
    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Interrupted(Interrupted),

    /// Any other backend failure
    #[error(transparent)]
    Store(StoreError),
}

impl ManagerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ManagerError::NotFound)
    }
}

impl From<StoreError> for ManagerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ManagerError::NotFound,
            StoreError::Interrupted(i) => ManagerError::Interrupted(i),
            other => ManagerError::Store(other),
        }
    }
}

/// Namespacing and optional compression over exactly one Store
pub struct Manager<S: Store> {
    store: S,
    config: ManagerConfig,
    span: tracing::Span,
}

impl<S: Store> Manager<S> {
    pub fn new(store: S, config: ManagerConfig, span: tracing::Span) -> Self {
        Self {
            store,
            config,
            span,
        }
    }

    pub fn set(&self, ctx: &CallContext, key: &[u8], value: &[u8]) -> Result<(), ManagerError> {
        if key.is_empty() {
            return Err(ManagerError::InvalidKey("key must not be empty".to_string()));
        }

        let stored = if self.config.use_compression {
            let packed = codec::compress(value);
            let _enter = self.span.enter();
            tracing::debug!(
                raw = value.len(),
                stored = packed.len(),
                ratio = packed.len() as f64 / value.len().max(1) as f64,
                "value compressed"
            );
            Bytes::from(packed)
        } else {
            Bytes::copy_from_slice(value)
        };

        self.store.set(ctx, &keys::wrap_key(key), stored)?;
        Ok(())
    }

    pub fn get(&self, ctx: &CallContext, key: &[u8]) -> Result<KeyValuePair, ManagerError> {
        let physical = keys::wrap_key(key);
        let stored = self.store.get(ctx, &physical)?;

        let value = if self.config.use_compression {
            Bytes::from(codec::decompress(&stored)?)
        } else {
            stored
        };
        let logical = keys::unwrap_key(&physical)?;

        Ok(KeyValuePair {
            key: Bytes::copy_from_slice(logical),
            value,
        })
    }

    pub fn delete(&self, ctx: &CallContext, key: &[u8]) -> Result<(), ManagerError> {
        self.store.delete(ctx, &keys::wrap_key(key))?;
        Ok(())
    }

    /// Collect logical entries under `opts.prefix`, at most `opts.limit` of them
    ///
    /// A malformed physical key or undecodable value fails the whole scan.
    pub fn scan(&self, ctx: &CallContext, opts: &ScanOptions) -> Result<ScanResult, ManagerError> {
        let physical = ScanOptions {
            prefix: keys::wrap_key(&opts.prefix),
            limit: opts.limit,
        };

        let mut entries = Vec::with_capacity(SCAN_CAPACITY);
        self.store
            .scan(ctx, &physical, |key, value| -> Result<Visit, ManagerError> {
                let logical = keys::unwrap_key(key)?;
                let value = self.decode_value(value)?;
                entries.push(KeyValuePair {
                    key: Bytes::copy_from_slice(logical),
                    value,
                });
                Ok(Visit::Continue)
            })?;

        Ok(entries)
    }

    /// Close the underlying store
    pub fn close(&self) -> Result<(), ManagerError> {
        self.store.close()?;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> ManagerConfig {
        self.config
    }

    fn decode_value(&self, stored: &[u8]) -> Result<Bytes, ManagerError> {
        if self.config.use_compression {
            Ok(Bytes::from(codec::decompress(stored)?))
        } else {
            Ok(Bytes::copy_from_slice(stored))
        }
    }
}
