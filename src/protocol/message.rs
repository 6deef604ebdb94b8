//! RPC message definitions
//!
//! Requests carry one [`Call`]; the service answers each with one [`Reply`].
//! Logical failures travel inside the reply's `error` field, so a reply that
//! arrived intact may still report that the call failed.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Method tags for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Delete,
    Scan,
    Ping,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Delete => "delete",
            Method::Scan => "scan",
            Method::Ping => "ping",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    /// Get a value by key
    Get { key: String },

    /// Put a key-value pair
    Put { key: String, value: Vec<u8> },

    /// Delete a key
    Delete { key: String },

    /// List entries under a prefix; `limit <= 0` means unbounded
    Scan { prefix: String, limit: i64 },

    /// Health check
    Ping,
}

impl Call {
    pub fn method(&self) -> Method {
        match self {
            Call::Get { .. } => Method::Get,
            Call::Put { .. } => Method::Put,
            Call::Delete { .. } => Method::Delete,
            Call::Scan { .. } => Method::Scan,
            Call::Ping => Method::Ping,
        }
    }
}

/// A call plus the caller's remaining time budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Milliseconds the service may spend on this call (None = no deadline)
    pub timeout_ms: Option<u64>,
    pub call: Call,
}

impl Request {
    pub fn new(call: Call) -> Self {
        Self {
            timeout_ms: None,
            call,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the budget from a remaining duration, rounded up to whole
    /// milliseconds so a sub-millisecond budget is not sent as expired
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        self.with_timeout_ms(timeout.map(|t| t.as_micros().div_ceil(1000) as u64))
    }
}

/// One scanned entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Structured error embedded in a reply
///
/// `code` uses the canonical RPC status numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub message: String,
    pub code: i32,
}

impl RpcError {
    pub const CANCELLED: i32 = 1;
    pub const INVALID_ARGUMENT: i32 = 3;
    pub const DEADLINE_EXCEEDED: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
    pub const INTERNAL: i32 = 13;
    pub const UNAVAILABLE: i32 = 14;
    pub const DATA_LOSS: i32 = 15;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Self::NOT_FOUND
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}

/// Answer to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Get {
        value: Vec<u8>,
        error: Option<RpcError>,
    },
    Put {
        error: Option<RpcError>,
    },
    Delete {
        error: Option<RpcError>,
    },
    Scan {
        entries: Vec<Entry>,
        error: Option<RpcError>,
    },
    Pong,

    /// The request could not be decoded; the connection is closed after this
    Rejected(RpcError),
}

impl Reply {
    /// The embedded error, if the call failed
    pub fn error(&self) -> Option<&RpcError> {
        match self {
            Reply::Get { error, .. }
            | Reply::Put { error }
            | Reply::Delete { error }
            | Reply::Scan { error, .. } => error.as_ref(),
            Reply::Rejected(err) => Some(err),
            Reply::Pong => None,
        }
    }

    /// The same kind of reply with its payload dropped and `error` set
    ///
    /// A `Pong` has no error field, so it becomes `Rejected`.
    pub fn into_failure(self, error: RpcError) -> Reply {
        match self {
            Reply::Get { .. } => Reply::Get {
                value: Vec::new(),
                error: Some(error),
            },
            Reply::Put { .. } => Reply::Put { error: Some(error) },
            Reply::Delete { .. } => Reply::Delete { error: Some(error) },
            Reply::Scan { .. } => Reply::Scan {
                entries: Vec::new(),
                error: Some(error),
            },
            Reply::Pong | Reply::Rejected(_) => Reply::Rejected(error),
        }
    }
}
