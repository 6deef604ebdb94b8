//! Call dispatch
//!
//! Turns one decoded [`Call`] into one [`Reply`] by invoking the Manager.
//! Manager failures are always reported through the reply's error field.

use crate::context::{CallContext, Interrupted};
use crate::error::TandemError;
use crate::manager::{KeyValuePair, Manager, ManagerError};
use crate::protocol::{Call, Entry, Reply, RpcError};
use crate::store::{ScanOptions, Store, StoreError};

/// Execute a call against the Manager
pub fn dispatch<S: Store>(manager: &Manager<S>, ctx: &CallContext, call: Call) -> Reply {
    match call {
        Call::Get { key } => match manager.get(ctx, key.as_bytes()) {
            Ok(pair) => Reply::Get {
                value: pair.value.to_vec(),
                error: None,
            },
            Err(e) => Reply::Get {
                value: Vec::new(),
                error: Some(rpc_error(&e)),
            },
        },
        Call::Put { key, value } => Reply::Put {
            error: manager.set(ctx, key.as_bytes(), &value).err().map(|e| rpc_error(&e)),
        },
        Call::Delete { key } => Reply::Delete {
            error: manager.delete(ctx, key.as_bytes()).err().map(|e| rpc_error(&e)),
        },
        Call::Scan { prefix, limit } => {
            let opts = ScanOptions::new()
                .with_prefix(prefix.into_bytes())
                .with_limit(scan_limit(limit));
            match manager.scan(ctx, &opts) {
                Ok(pairs) => Reply::Scan {
                    entries: pairs.into_iter().map(to_entry).collect(),
                    error: None,
                },
                Err(e) => Reply::Scan {
                    entries: Vec::new(),
                    error: Some(rpc_error(&e)),
                },
            }
        }
        Call::Ping => Reply::Pong,
    }
}

/// Wire limit → scan limit (`<= 0` is unbounded)
pub fn scan_limit(limit: i64) -> usize {
    if limit <= 0 {
        0
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

fn to_entry(pair: KeyValuePair) -> Entry {
    Entry {
        key: String::from_utf8_lossy(&pair.key).into_owned(),
        value: pair.value.to_vec(),
    }
}

/// Structured error for a Manager failure
pub fn rpc_error(err: &ManagerError) -> RpcError {
    let code = match err {
        ManagerError::NotFound => RpcError::NOT_FOUND,
        ManagerError::InvalidKey(_) => RpcError::INVALID_ARGUMENT,
        ManagerError::Decode(_) => RpcError::DATA_LOSS,
        ManagerError::Interrupted(Interrupted::Cancelled) => RpcError::CANCELLED,
        ManagerError::Interrupted(Interrupted::DeadlineExceeded) => RpcError::DEADLINE_EXCEEDED,
        ManagerError::Store(StoreError::Io(TandemError::Closed)) => RpcError::UNAVAILABLE,
        ManagerError::Store(_) => RpcError::INTERNAL,
    };
    RpcError::new(code, err.to_string())
}

