//! In-memory backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::context::CallContext;
use crate::error::TandemError;

use super::{LimitCounter, ScanOptions, Store, StoreError, Visit};

/// Hash map behind a single reader/writer lock
///
/// `get` and `scan` share the lock, `set` and `delete` take it exclusively.
/// A scan holds the read lock for its whole duration, so a slow visitor
/// delays writers. Iteration order is unspecified.
pub struct MemoryStore {
    map: RwLock<HashMap<Vec<u8>, Bytes>>,
    closed: AtomicBool,
    span: tracing::Span,
}

impl MemoryStore {
    pub fn new(span: tracing::Span) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            span,
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    fn ready(&self, ctx: &CallContext) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Io(TandemError::Closed));
        }
        ctx.check()?;
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(tracing::Span::none())
    }
}

impl Store for MemoryStore {
    fn set(&self, ctx: &CallContext, key: &[u8], value: Bytes) -> Result<(), StoreError> {
        self.ready(ctx)?;
        self.map.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn get(&self, ctx: &CallContext, key: &[u8]) -> Result<Bytes, StoreError> {
        self.ready(ctx)?;
        self.map.read().get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn delete(&self, ctx: &CallContext, key: &[u8]) -> Result<(), StoreError> {
        self.ready(ctx)?;
        self.map.write().remove(key);
        Ok(())
    }

    fn scan<E, F>(&self, ctx: &CallContext, opts: &ScanOptions, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<Visit, E>,
        E: From<StoreError>,
    {
        self.ready(ctx)?;
        let map = self.map.read();
        let mut counter = LimitCounter::new(opts.limit);

        for (key, value) in map.iter() {
            if !opts.matches(key) {
                continue;
            }
            ctx.check().map_err(StoreError::from)?;
            if !counter.admit() {
                break;
            }
            if visit(key.as_slice(), &value[..])? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _enter = self.span.enter();
            tracing::debug!(entries = self.len(), "memory store closed");
        }
        Ok(())
    }
}
