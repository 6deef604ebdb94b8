//! Persistent backend over the embedded engine

use bytes::Bytes;

use crate::config::EngineConfig;
use crate::context::CallContext;
use crate::engine::Engine;
use crate::error::TandemError;

use super::{LimitCounter, ScanOptions, Store, StoreError, Visit};

/// Wraps the embedded engine's transactions
///
/// Writes commit one read-write transaction each; reads run in a read-only
/// transaction that ends before the call returns.
pub struct PersistentStore {
    engine: Engine,
    span: tracing::Span,
}

/// How a scan inside a read transaction went wrong
enum ScanFailure<E> {
    Engine(TandemError),
    Visitor(E),
}

impl<E> From<TandemError> for ScanFailure<E> {
    fn from(err: TandemError) -> Self {
        ScanFailure::Engine(err)
    }
}

impl PersistentStore {
    pub fn open(config: EngineConfig, span: tracing::Span) -> Result<Self, TandemError> {
        let engine = span.in_scope(|| Engine::open(config))?;
        Ok(Self { engine, span })
    }

    /// The underlying engine (for tests and diagnostics)
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn io_failure(&self, op: &'static str, err: TandemError) -> StoreError {
        let _enter = self.span.enter();
        tracing::error!(op, error = %err, "engine operation failed");
        StoreError::Io(err)
    }
}

impl Store for PersistentStore {
    fn set(&self, ctx: &CallContext, key: &[u8], value: Bytes) -> Result<(), StoreError> {
        ctx.check()?;
        self.engine
            .update(|txn| {
                txn.put(key, &value);
                Ok::<_, TandemError>(())
            })
            .map_err(|e| self.io_failure("set", e))
    }

    fn get(&self, ctx: &CallContext, key: &[u8]) -> Result<Bytes, StoreError> {
        ctx.check()?;
        let found = self
            .engine
            .view(|txn| txn.get(key))
            .map_err(|e| self.io_failure("get", e))?;
        found.map(Bytes::from).ok_or(StoreError::NotFound)
    }

    fn delete(&self, ctx: &CallContext, key: &[u8]) -> Result<(), StoreError> {
        ctx.check()?;
        self.engine
            .update(|txn| {
                txn.delete(key);
                Ok::<_, TandemError>(())
            })
            .map_err(|e| self.io_failure("delete", e))
    }

    fn scan<E, F>(&self, ctx: &CallContext, opts: &ScanOptions, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<Visit, E>,
        E: From<StoreError>,
    {
        ctx.check().map_err(StoreError::from)?;

        let outcome = self.engine.view(|txn| -> Result<(), ScanFailure<E>> {
            let mut counter = LimitCounter::new(opts.limit);
            for item in txn.prefix_iter(&opts.prefix) {
                let (key, value) = item?;
                if !opts.matches(&key) {
                    break;
                }
                ctx.check()
                    .map_err(|i| ScanFailure::Visitor(E::from(StoreError::from(i))))?;
                if !counter.admit() {
                    break;
                }
                match visit(key.as_slice(), value.as_slice()) {
                    Ok(Visit::Continue) => {}
                    Ok(Visit::Stop) => break,
                    Err(e) => return Err(ScanFailure::Visitor(e)),
                }
            }
            Ok(())
        });

        match outcome {
            Ok(()) => Ok(()),
            Err(ScanFailure::Engine(err)) => Err(E::from(self.io_failure("scan", err))),
            Err(ScanFailure::Visitor(err)) => Err(err),
        }
    }

    fn close(&self) -> Result<(), StoreError> {
        self.engine
            .close()
            .map_err(|e| self.io_failure("close", e))?;
        let _enter = self.span.enter();
        tracing::debug!("persistent store closed");
        Ok(())
    }
}
