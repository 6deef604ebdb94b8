//! Protocol Module
//!
//! Defines the RPC protocol between the gateway (or CLI) and the store
//! service.
//!
//! ## Frame Format
//! ```text
//! ┌────────────┬──────────┬─────────────────────────────┐
//! │ Version(1) │ Len (4)  │         Payload             │
//! └────────────┴──────────┴─────────────────────────────┘
//! ```
//! The payload is a bincode-encoded [`Request`] or [`Reply`].
//!
//! ### Calls
//! - GET    - key → value
//! - PUT    - key, value
//! - DELETE - key
//! - SCAN   - prefix, limit → entries
//! - PING   - health check
//!
//! ### Error Codes
//! Embedded [`RpcError`]s use the canonical RPC status numbers:
//! 1 CANCELLED, 3 INVALID_ARGUMENT, 4 DEADLINE_EXCEEDED, 5 NOT_FOUND,
//! 13 INTERNAL, 14 UNAVAILABLE, 15 DATA_LOSS.

mod codec;
mod message;

pub use codec::{
    decode_frame, decode_reply, decode_request, encode_frame, encode_reply, encode_request,
    read_frame, read_reply, read_request, write_frame, write_reply, write_request,
    FRAME_VERSION, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use message::{Call, Entry, Method, Reply, Request, RpcError};
