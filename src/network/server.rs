//! TCP Server
//!
//! Accepts connections and serves each on its own thread.
//!
//! ## Shutdown
//! 1. `ShutdownHandle::shutdown()` stops the accept loop
//! 2. Idle connections notice the flag and close; busy ones finish their
//!    current request first
//! 3. After `shutdown_grace` the root context is cancelled so lingering
//!    calls unwind
//! 4. The backend is closed whether or not every connection drained

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::config::ServerConfig;
use crate::context::CallContext;
use crate::error::{Result, TandemError};
use crate::manager::Manager;
use crate::protocol::{write_reply, Reply, RpcError};
use crate::store::Store;

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Stops a running [`Server`] from any thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// RPC server for the store service
pub struct Server<S: Store + 'static> {
    config: ServerConfig,
    manager: Arc<Manager<S>>,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    root: CallContext,
    span: tracing::Span,
}

impl<S: Store + 'static> Server<S> {
    /// Bind the listener; connections are accepted once `run` is called
    pub fn bind(config: ServerConfig, manager: Arc<Manager<S>>, span: tracing::Span) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            TandemError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            manager,
            listener,
            local_addr,
            shutdown: Arc::new(AtomicBool::new(false)),
            root: CallContext::background(),
            span,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    pub fn manager(&self) -> &Arc<Manager<S>> {
        &self.manager
    }

    /// Serve until shut down, then drain connections and close the backend
    pub fn run(self) -> Result<()> {
        let _enter = self.span.enter();
        tracing::info!(addr = %self.local_addr, "listening");

        let (drain_tx, drain_rx) = channel::unbounded::<()>();
        let active = Arc::new(AtomicUsize::new(0));

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer, &active, &drain_tx),
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        tracing::info!(
            in_flight = active.load(Ordering::Acquire),
            "shutdown requested, draining connections"
        );
        drop(drain_tx);
        drop(self.listener);

        match drain_rx.recv_timeout(self.config.shutdown_grace()) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                tracing::info!("all connections drained");
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    remaining = active.load(Ordering::Acquire),
                    "grace period elapsed, cancelling in-flight calls"
                );
                self.root.cancel();
            }
        }

        match self.manager.close() {
            Ok(()) => tracing::info!("backend closed"),
            Err(e) => {
                tracing::error!(error = %e, "failed to close backend");
                return Err(TandemError::Storage(e.to_string()));
            }
        }
        Ok(())
    }

    fn admit(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        active: &Arc<AtomicUsize>,
        drain_tx: &Sender<()>,
    ) {
        // Accepted sockets may inherit the listener's non-blocking mode.
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!(%peer, error = %e, "dropping connection");
            return;
        }

        if active.load(Ordering::Acquire) >= self.config.max_connections {
            tracing::warn!(%peer, limit = self.config.max_connections, "connection limit reached");
            let mut stream = stream;
            let _ = write_reply(
                &mut stream,
                &Reply::Rejected(RpcError::new(RpcError::UNAVAILABLE, "too many connections")),
            );
            return;
        }

        let mut conn = match Connection::new(
            stream,
            Arc::clone(&self.manager),
            self.root.clone(),
            Arc::clone(&self.shutdown),
        ) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "failed to set up connection");
                return;
            }
        };
        if let Err(e) = conn.set_timeouts(self.config.read_timeout_ms, self.config.write_timeout_ms) {
            tracing::warn!(%peer, error = %e, "failed to set socket timeouts");
            return;
        }

        active.fetch_add(1, Ordering::AcqRel);
        let counter = Arc::clone(active);
        let drain_guard = drain_tx.clone();
        let span = tracing::debug_span!(parent: &self.span, "connection", %peer);

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", peer))
            .spawn(move || {
                let _enter = span.enter();
                if let Err(e) = conn.handle() {
                    tracing::debug!(error = %e, "connection ended with error");
                }
                counter.fetch_sub(1, Ordering::AcqRel);
                drop(drain_guard);
            });

        if let Err(e) = spawned {
            active.fetch_sub(1, Ordering::AcqRel);
            tracing::error!(%peer, error = %e, "failed to spawn connection thread");
        }
    }
}
