//! Network Module
//!
//! TCP server and client for the RPC protocol.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls the shutdown flag)
//! - One thread per connection, capped by `max_connections`
//! - Calls dispatched to the Manager by `handler`
//! - `StoreClient` keeps a pool of persistent outbound connections

mod client;
mod connection;
mod handler;
mod server;

pub use client::{ClientError, StoreClient};
pub use connection::Connection;
pub use handler::{dispatch, rpc_error, scan_limit};
pub use server::{Server, ShutdownHandle};
