//! Connection Handler
//!
//! Serves RPC requests arriving on one accepted TCP connection.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::CallContext;
use crate::error::{Result, TandemError};
use crate::manager::Manager;
use crate::protocol::{encode_reply, read_request, Reply, RpcError};
use crate::store::Store;

use super::handler;

/// How often an idle connection re-checks the shutdown flag
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Handles a single client connection
pub struct Connection<S: Store> {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    manager: Arc<Manager<S>>,

    /// Parent of every per-request context; cancelled when the grace period ends
    root: CallContext,

    shutdown: Arc<AtomicBool>,

    /// Budget for reading the rest of a frame once its first byte arrived
    read_timeout: Option<Duration>,

    /// Peer address for logging
    peer_addr: String,
}

impl<S: Store> Connection<S> {
    /// Create a new connection handler
    pub fn new(
        stream: TcpStream,
        manager: Arc<Manager<S>>,
        root: CallContext,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            manager,
            root,
            shutdown,
            read_timeout: None,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 disables)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        self.read_timeout = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends replies. Returns when the client
    /// disconnects, the server shuts down, or a frame cannot be decoded.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "connection established");

        loop {
            if !self.wait_for_request()? {
                return Ok(());
            }

            self.reader.get_ref().set_read_timeout(self.read_timeout)?;
            let request = match read_request(&mut self.reader) {
                Ok(req) => req,
                Err(TandemError::Io(ref e)) if is_disconnect(e) => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected mid-frame");
                    return Ok(());
                }
                Err(e @ (TandemError::Protocol(_) | TandemError::Serialization(_))) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "rejecting malformed request");
                    let rejected = Reply::Rejected(RpcError::new(
                        RpcError::INVALID_ARGUMENT,
                        e.to_string(),
                    ));
                    let _ = self.send_reply(rejected);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "read failed");
                    return Err(e);
                }
            };

            let method = request.call.method();
            let ctx = self
                .root
                .child(request.timeout_ms.map(Duration::from_millis));
            let started = Instant::now();
            let reply = handler::dispatch(&*self.manager, &ctx, request.call);

            tracing::debug!(
                peer = %self.peer_addr,
                %method,
                elapsed_us = started.elapsed().as_micros() as u64,
                code = reply.error().map(|e| e.code).unwrap_or(0),
                "request served"
            );

            if let Err(e) = self.send_reply(reply) {
                if let TandemError::Io(ref io_err) = e {
                    if is_disconnect(io_err) {
                        tracing::debug!(
                            peer = %self.peer_addr,
                            "client disconnected before reply could be sent"
                        );
                        return Ok(());
                    }
                }
                tracing::warn!(peer = %self.peer_addr, error = %e, "write failed");
                return Err(e);
            }
        }
    }

    /// Block until the next request's first byte is buffered
    ///
    /// Returns `false` on clean EOF or once shutdown has been signalled.
    fn wait_for_request(&mut self) -> Result<bool> {
        self.reader.get_ref().set_read_timeout(Some(IDLE_POLL))?;

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::debug!(peer = %self.peer_addr, "closing idle connection for shutdown");
                return Ok(false);
            }

            match self.reader.fill_buf() {
                Ok(buf) if buf.is_empty() => {
                    tracing::debug!(peer = %self.peer_addr, "client disconnected");
                    return Ok(false);
                }
                Ok(_) => return Ok(true),
                Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_disconnect(&e) => {
                    tracing::debug!(peer = %self.peer_addr, "connection reset by client");
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write one reply frame
    ///
    /// A reply too large for one frame is replaced by the same kind of reply
    /// carrying an INTERNAL error, so the connection stays usable.
    fn send_reply(&mut self, reply: Reply) -> Result<()> {
        let frame = match encode_reply(&reply) {
            Ok(frame) => frame,
            Err(TandemError::Protocol(reason)) => {
                tracing::warn!(peer = %self.peer_addr, %reason, "reply exceeds frame limit");
                let error = RpcError::new(
                    RpcError::INTERNAL,
                    format!("result exceeds frame limit: {}", reason),
                );
                encode_reply(&reply.into_failure(error))?
            }
            Err(e) => return Err(e),
        };

        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Read timeout (Windows reports TimedOut instead of WouldBlock)
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
