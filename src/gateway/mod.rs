//! HTTP gateway.
//!
//! Stateless front-end that proxies every request to the store service:
//!
//! | Route              | Call         |
//! |--------------------|--------------|
//! | `GET /{key}`       | Get          |
//! | `PUT /{key}`       | Put (body)   |
//! | `DELETE /{key}`    | Delete       |
//! | `GET /?prefix=&limit=` | Scan     |
//!
//! Keys may contain `/`; the route captures the rest of the path.

mod error;
mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::error::{Result, TandemError};
use crate::network::StoreClient;

pub use error::ApiError;
pub use handlers::{AppState, KeyValueBody, ScanBody, ScanParams};

/// Build the gateway's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::scan)
                .put(handlers::missing_key)
                .delete(handlers::missing_key),
        )
        .route(
            "/*key",
            get(handlers::get_key)
                .put(handlers::put_key)
                .delete(handlers::delete_key),
        )
        .layer(middleware::from_fn_with_state(state.clone(), log_request))
        .with_state(state)
}

/// Logs one summary line per request.
async fn log_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = tracing::debug_span!(parent: &state.span, "request", %method, %uri);
    let response = next.run(request).instrument(span).await;

    tracing::info!(
        parent: &state.span,
        %method,
        %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "request served"
    );
    response
}

/// A bound gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    listener: TcpListener,
    state: AppState,
}

impl Gateway {
    /// Connect to the store service and bind the HTTP listener.
    pub async fn bind(config: GatewayConfig, span: tracing::Span) -> Result<Self> {
        config.validate()?;

        let client_config = config.clone();
        let client_span = tracing::info_span!(parent: &span, "store_client");
        let client = tokio::task::spawn_blocking(move || {
            StoreClient::from_config(&client_config, client_span)
        })
        .await
        .map_err(|e| TandemError::Network(format!("client setup panicked: {}", e)))?
        .map_err(|e| TandemError::Network(e.to_string()))?;

        let listener = TcpListener::bind(&config.listen_addr).await.map_err(|e| {
            TandemError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;

        let state = AppState {
            client: Arc::new(client),
            request_timeout: config.request_timeout(),
            span,
        };

        Ok(Self {
            config,
            listener,
            state,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then drain for at most the grace period.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        let Gateway {
            config,
            listener,
            state,
        } = self;
        let span = state.span.clone();
        let grace = config.shutdown_grace();
        let app = router(state);

        tracing::info!(parent: &span, %addr, store = %config.store_addr, "gateway listening");

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::select! {
            _ = shutdown => {}
            joined = &mut server => {
                return match joined {
                    Ok(served) => served.map_err(TandemError::from),
                    Err(e) => Err(TandemError::Network(format!("gateway task failed: {}", e))),
                };
            }
        }

        tracing::info!(parent: &span, grace_ms = grace.as_millis() as u64, "shutting down gateway");
        let _ = stop_tx.send(());

        match tokio::time::timeout(grace, &mut server).await {
            Ok(Ok(served)) => served.map_err(TandemError::from)?,
            Ok(Err(e)) => return Err(TandemError::Network(format!("gateway task failed: {}", e))),
            Err(_) => {
                tracing::warn!(parent: &span, "grace period elapsed, aborting in-flight requests");
                server.abort();
            }
        }

        tracing::info!(parent: &span, "gateway stopped");
        Ok(())
    }
}
