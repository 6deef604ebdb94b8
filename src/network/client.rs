//! RPC Client
//!
//! Blocking client for the store service with a pool of persistent
//! connections. Each call borrows an idle connection (dialing a new one if
//! none is idle) and returns it afterwards. A connection that fails is
//! dropped and the failure surfaced; calls are never retried.
//!
//! While waiting for a reply the client re-checks the call's context every
//! few milliseconds, so a cancelled call gives up its connection promptly
//! instead of blocking until the reply or the deadline arrives.

use std::io::{self, BufRead, BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::context::{CallContext, Interrupted};
use crate::error::TandemError;
use crate::protocol::{read_reply, write_request, Call, Entry, Method, Reply, Request, RpcError};

/// Errors surfaced by [`StoreClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with an embedded error
    #[error("remote error: {0}")]
    Remote(RpcError),

    /// The call never produced a reply
    #[error("transport error: {0}")]
    Transport(#[from] TandemError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("unexpected reply to {method}")]
    UnexpectedReply { method: Method },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Remote(e) if e.is_not_found())
    }
}

type ClientResult<T> = std::result::Result<T, ClientError>;

/// How often a call waiting for its reply re-checks its context
const REPLY_POLL: Duration = Duration::from_millis(20);

/// Sockets reject a zero timeout
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_millis(1);

struct PooledConn {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl PooledConn {
    fn dial(addr: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a request and wait for its reply under `ctx`
    fn exchange(&mut self, ctx: &CallContext, request: &Request) -> ClientResult<Reply> {
        let budget = socket_timeout(ctx);
        self.writer
            .get_ref()
            .set_write_timeout(budget)
            .map_err(TandemError::from)?;
        write_request(&mut self.writer, request).map_err(|e| classify(e, ctx))?;

        self.wait_for_reply(ctx)?;

        // The reply has started arriving; read the rest within the deadline
        self.reader
            .get_ref()
            .set_read_timeout(socket_timeout(ctx))
            .map_err(TandemError::from)?;
        read_reply(&mut self.reader).map_err(|e| classify(e, ctx))
    }

    /// Block until the reply's first byte is buffered, checking `ctx` between polls
    fn wait_for_reply(&mut self, ctx: &CallContext) -> ClientResult<()> {
        loop {
            ctx.check()?;

            let poll = ctx
                .remaining()
                .map_or(REPLY_POLL, |r| r.min(REPLY_POLL))
                .max(MIN_SOCKET_TIMEOUT);
            self.reader
                .get_ref()
                .set_read_timeout(Some(poll))
                .map_err(TandemError::from)?;

            match self.reader.fill_buf() {
                Ok(buf) if buf.is_empty() => {
                    return Err(ClientError::Transport(TandemError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "service closed the connection",
                    ))));
                }
                Ok(_) => return Ok(()),
                Err(e) if is_timeout(&e) || e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ClientError::Transport(e.into())),
            }
        }
    }
}

/// Pooled client for the store service
pub struct StoreClient {
    addr: SocketAddr,
    connect_timeout: Duration,
    idle: ArrayQueue<PooledConn>,
    span: tracing::Span,
}

impl StoreClient {
    /// Resolve `addr` and dial the first connection
    ///
    /// Fails if the service is unreachable.
    pub fn connect(
        addr: &str,
        connect_timeout: Duration,
        max_idle: usize,
        span: tracing::Span,
    ) -> ClientResult<Self> {
        let resolved = addr
            .to_socket_addrs()
            .map_err(|e| TandemError::Network(format!("cannot resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| TandemError::Network(format!("{} resolved to no address", addr)))?;

        let client = Self {
            addr: resolved,
            connect_timeout,
            idle: ArrayQueue::new(max_idle.max(1)),
            span,
        };

        let first = client.dial(connect_timeout)?;
        let _ = client.idle.push(first);
        {
            let _enter = client.span.enter();
            tracing::debug!(addr = %client.addr, "connected to store service");
        }
        Ok(client)
    }

    pub fn from_config(config: &GatewayConfig, span: tracing::Span) -> ClientResult<Self> {
        Self::connect(
            &config.store_addr,
            config.connect_timeout(),
            config.max_idle_connections,
            span,
        )
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Connections currently parked in the pool
    pub fn idle_connections(&self) -> usize {
        self.idle.len()
    }

    pub fn get(&self, ctx: &CallContext, key: &str) -> ClientResult<Vec<u8>> {
        match self.call(ctx, Call::Get { key: key.to_string() })? {
            Reply::Get { error: Some(e), .. } => Err(ClientError::Remote(e)),
            Reply::Get { value, error: None } => Ok(value),
            _ => Err(ClientError::UnexpectedReply { method: Method::Get }),
        }
    }

    pub fn put(&self, ctx: &CallContext, key: &str, value: &[u8]) -> ClientResult<()> {
        let call = Call::Put {
            key: key.to_string(),
            value: value.to_vec(),
        };
        match self.call(ctx, call)? {
            Reply::Put { error: Some(e) } => Err(ClientError::Remote(e)),
            Reply::Put { error: None } => Ok(()),
            _ => Err(ClientError::UnexpectedReply { method: Method::Put }),
        }
    }

    pub fn delete(&self, ctx: &CallContext, key: &str) -> ClientResult<()> {
        match self.call(ctx, Call::Delete { key: key.to_string() })? {
            Reply::Delete { error: Some(e) } => Err(ClientError::Remote(e)),
            Reply::Delete { error: None } => Ok(()),
            _ => Err(ClientError::UnexpectedReply { method: Method::Delete }),
        }
    }

    /// Entries under `prefix`; `limit <= 0` means unbounded
    pub fn scan(&self, ctx: &CallContext, prefix: &str, limit: i64) -> ClientResult<Vec<Entry>> {
        let call = Call::Scan {
            prefix: prefix.to_string(),
            limit,
        };
        match self.call(ctx, call)? {
            Reply::Scan { error: Some(e), .. } => Err(ClientError::Remote(e)),
            Reply::Scan { entries, error: None } => Ok(entries),
            _ => Err(ClientError::UnexpectedReply { method: Method::Scan }),
        }
    }

    pub fn ping(&self, ctx: &CallContext) -> ClientResult<()> {
        match self.call(ctx, Call::Ping)? {
            Reply::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedReply { method: Method::Ping }),
        }
    }

    /// One request/reply exchange on a pooled connection
    fn call(&self, ctx: &CallContext, call: Call) -> ClientResult<Reply> {
        ctx.check()?;
        let remaining = ctx.remaining();
        if remaining == Some(Duration::ZERO) {
            return Err(Interrupted::DeadlineExceeded.into());
        }

        let method = call.method();
        let mut conn = match self.idle.pop() {
            Some(conn) => conn,
            None => {
                let dial_timeout = remaining.map_or(self.connect_timeout, |r| r.min(self.connect_timeout));
                self.dial(dial_timeout)?
            }
        };

        let request = Request::new(call).with_timeout(remaining);

        match conn.exchange(ctx, &request) {
            Ok(Reply::Rejected(err)) => {
                // The service closes the connection after rejecting a request.
                Err(ClientError::Remote(err))
            }
            Ok(reply) => {
                let _ = self.idle.push(conn);
                Ok(reply)
            }
            Err(ClientError::Interrupted(why)) => {
                // A late reply would desynchronise the connection, so it is dropped
                let _enter = self.span.enter();
                tracing::debug!(%method, reason = %why, "abandoning call");
                Err(ClientError::Interrupted(why))
            }
            Err(err) => {
                let _enter = self.span.enter();
                tracing::warn!(%method, error = %err, "dropping broken connection");
                Err(err)
            }
        }
    }

    fn dial(&self, timeout: Duration) -> ClientResult<PooledConn> {
        PooledConn::dial(self.addr, timeout).map_err(|e| {
            ClientError::Transport(TandemError::Network(format!(
                "cannot connect to {}: {}",
                self.addr, e
            )))
        })
    }
}

/// Socket budget for the rest of a call (None = no deadline)
fn socket_timeout(ctx: &CallContext) -> Option<Duration> {
    ctx.remaining().map(|r| r.max(MIN_SOCKET_TIMEOUT))
}

/// Read timeout (Windows reports TimedOut instead of WouldBlock)
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// A socket timeout while the caller's deadline has passed is the deadline
fn classify(err: TandemError, ctx: &CallContext) -> ClientError {
    if let TandemError::Io(ref io_err) = err {
        if is_timeout(io_err) && ctx.deadline().is_some() {
            return ClientError::Interrupted(Interrupted::DeadlineExceeded);
        }
    }
    if ctx.is_cancelled() {
        return ClientError::Interrupted(Interrupted::Cancelled);
    }
    ClientError::Transport(err)
}
