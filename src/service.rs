//! Store Service
//!
//! Hosts one Manager and its backend behind the RPC endpoint. The service is
//! the only writer of the backend.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::manager::Manager;
use crate::network::{Server, ShutdownHandle};
use crate::store::Backend;

pub struct StoreService {
    server: Server<Backend>,
}

impl StoreService {
    /// Validate `config`, open the backend and bind the listener
    ///
    /// Component spans are children of `span`.
    pub fn start(config: &Config, span: tracing::Span) -> Result<Self> {
        config.validate()?;

        let backend = Backend::open(
            config.backend,
            &config.engine,
            tracing::info_span!(parent: &span, "backend", kind = %config.backend),
        )?;
        let manager = Manager::new(
            backend,
            config.manager,
            tracing::info_span!(
                parent: &span,
                "manager",
                compression = config.manager.use_compression
            ),
        );
        let server = Server::bind(
            config.server.clone(),
            Arc::new(manager),
            tracing::info_span!(parent: &span, "rpc"),
        )?;

        Ok(Self { server })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.server.shutdown_handle()
    }

    pub fn manager(&self) -> &Arc<Manager<Backend>> {
        self.server.manager()
    }

    /// Serve until shut down; the backend is closed before this returns
    pub fn run(self) -> Result<()> {
        self.server.run()
    }
}
